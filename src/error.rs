// src/error.rs

//! Error types shared by every stage of the pipeline.

use thiserror::Error;

use crate::device::Field;

pub type Result<T> = std::result::Result<T, PlmError>;

/// Invalid device parameters, detected while building or updating a profile.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("`bitpack_layout` must be 2D, got {ndim} dimension(s) with shape {shape:?}")]
    LayoutNotTwoDimensional { ndim: usize, shape: Vec<usize> },

    #[error("`bitpack_layout` must not be empty, got shape {shape:?}")]
    EmptyLayout { shape: Vec<usize> },

    #[error("`bitpack_layout` is not rectangular: {reason}")]
    RaggedLayout { reason: String },

    #[error("`bitpack_layout` uses bit {bit} more than once")]
    DuplicateLayoutBit { bit: u32 },

    #[error(
        "`bitpack_layout` bit {bit} exceeds the {width}-bit width implied by the largest `memory_lut` value {max_value}"
    )]
    LayoutBitOutOfRange { bit: u32, width: u32, max_value: u32 },

    #[error("`displacement_ratios` array must not be empty")]
    EmptyDisplacementRatios,

    #[error(
        "`displacement_ratios` array must be monotonically increasing: ratio[{index}] = {next} follows {prev}"
    )]
    NonIncreasingDisplacementRatios { index: usize, prev: f64, next: f64 },

    #[error("`displacement_ratios` values must lie in [0, 1], got {value} at index {index}")]
    DisplacementRatioOutOfRange { index: usize, value: f64 },

    #[error("`memory_lut` has {lut_len} entries but there are {levels} displacement levels")]
    LutLengthMismatch { lut_len: usize, levels: usize },

    #[error("`phase_range` must satisfy min < max with finite bounds, got ({min}, {max})")]
    InvalidPhaseRange { min: f64, max: f64 },

    #[error("`shape` must be positive in both dimensions, got ({rows}, {cols})")]
    InvalidShape { rows: usize, cols: usize },

    #[error("field `{0}` is read-only for this device")]
    ReadOnlyField(Field),
}

#[derive(Debug, Error)]
pub enum PlmError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Phase map shape ({actual:?}) does not match device shape ({expected:?}).")]
    ShapeMismatch { expected: Vec<usize>, actual: Vec<usize> },

    #[error("Unrecognized device name `{name}`. Please select from one of {available:?}")]
    UnknownDevice { name: String, available: Vec<String> },

    #[error("expected an array with at least 2 dimensions (rows, columns), got shape {shape:?}")]
    MissingImageAxes { shape: Vec<usize> },

    #[error("phase state index {level} is out of range for a device with {n_levels} levels")]
    LevelOutOfRange { level: usize, n_levels: usize },

    #[error("bit-plane {plane} contains value {value}; only 0 and 1 can be packed")]
    NonBinaryPlane { plane: usize, value: u8 },

    #[error("cannot pack an empty sequence of bit-planes")]
    EmptyPlaneStack,

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("device catalog JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("device catalog I/O error: {0}")]
    Io(#[from] std::io::Error),
}
