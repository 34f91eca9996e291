// src/encode.rs

//! # Electrode encoding
//!
//! Expands phase state indices into the binary pattern written to the memory
//! cells under each mirror. Every input pixel becomes an `R x C` block of bits,
//! where `R x C` is the shape of the bitpack layout, and block cell `(r, c)`
//! carries bit `layout[r, c]` of the pixel's memory word.

use std::collections::HashSet;

use ndarray::{Array, Array2, Array3, ArrayBase, ArrayD, Axis, Data, Dimension, IxDyn};
use rayon::prelude::*;

use crate::error::{ConfigError, PlmError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct ElectrodeEncoder {
    memory_lut: Vec<u32>,
    layout: Array2<u32>,
    data_flip: (bool, bool),
}

impl ElectrodeEncoder {
    /// Validates the electrode tables.
    ///
    /// The layout must be a non-empty 2D grid of distinct bit positions, each of
    /// which exists in the bit width of the largest `memory_lut` value.
    pub fn new(
        memory_lut: Vec<u32>,
        bitpack_layout: ArrayD<u32>,
        data_flip: (bool, bool),
    ) -> std::result::Result<Self, ConfigError> {
        if bitpack_layout.ndim() != 2 {
            return Err(ConfigError::LayoutNotTwoDimensional {
                ndim: bitpack_layout.ndim(),
                shape: bitpack_layout.shape().to_vec(),
            });
        }
        if bitpack_layout.is_empty() {
            return Err(ConfigError::EmptyLayout { shape: bitpack_layout.shape().to_vec() });
        }
        let layout = bitpack_layout
            .into_dimensionality::<ndarray::Ix2>()
            .map_err(|e| ConfigError::RaggedLayout { reason: e.to_string() })?;

        let mut seen = HashSet::with_capacity(layout.len());
        for &bit in layout.iter() {
            if !seen.insert(bit) {
                return Err(ConfigError::DuplicateLayoutBit { bit });
            }
        }

        let max_value = memory_lut.iter().copied().max().unwrap_or(0);
        let width = bit_width(max_value);
        if let Some(&bit) = layout.iter().find(|&&bit| bit >= width) {
            return Err(ConfigError::LayoutBitOutOfRange { bit, width, max_value });
        }

        Ok(Self { memory_lut, layout, data_flip })
    }

    pub fn memory_lut(&self) -> &[u32] {
        &self.memory_lut
    }

    pub fn layout(&self) -> &Array2<u32> {
        &self.layout
    }

    pub fn data_flip(&self) -> (bool, bool) {
        self.data_flip
    }

    pub fn n_levels(&self) -> usize {
        self.memory_lut.len()
    }

    /// Output shape for an input of shape `shape`: the last two axes are scaled by the layout.
    pub fn encoded_shape(&self, shape: &[usize]) -> Result<Vec<usize>> {
        let ndim = shape.len();
        if ndim < 2 {
            return Err(PlmError::MissingImageAxes { shape: shape.to_vec() });
        }
        let (cell_rows, cell_cols) = self.layout.dim();
        let mut out = shape.to_vec();
        out[ndim - 2] *= cell_rows;
        out[ndim - 1] *= cell_cols;
        Ok(out)
    }

    /// Converts phase state indices into a 0/1 electrode bitmap.
    ///
    /// The last two axes of `phase_state_idx` are (row, column); any leading axes
    /// (channels, frames) are carried through unchanged. Fails without producing
    /// output if an index has no `memory_lut` entry.
    pub fn encode<S, D>(&self, phase_state_idx: &ArrayBase<S, D>) -> Result<Array<u8, D>>
    where
        S: Data<Elem = usize>,
        D: Dimension,
    {
        let shape = phase_state_idx.shape();
        let out_shape = self.encoded_shape(shape)?;
        let ndim = shape.len();

        let n_levels = self.n_levels();
        if let Some(&level) = phase_state_idx.iter().find(|&&level| level >= n_levels) {
            return Err(PlmError::LevelOutOfRange { level, n_levels });
        }

        let (rows, cols) = (shape[ndim - 2], shape[ndim - 1]);
        let frames: usize = shape[..ndim - 2].iter().product();

        // memory words in logical order, flattened to (frame, row, column)
        let memory: Vec<u32> = phase_state_idx.iter().map(|&level| self.memory_lut[level]).collect();
        let memory = Array3::from_shape_vec((frames, rows, cols), memory)?;

        let (cell_rows, cell_cols) = self.layout.dim();
        let (out_rows, out_cols) = (rows * cell_rows, cols * cell_cols);
        let (flip_rows, flip_cols) = self.data_flip;

        let mut out = Array3::<u8>::zeros((frames, out_rows, out_cols));
        out.axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(f, mut plane)| {
                let words = memory.index_axis(Axis(0), f);
                for ((y, x), cell) in plane.indexed_iter_mut() {
                    // flips act on the expanded bitmap, so read from the mirrored position
                    let sy = if flip_rows { out_rows - 1 - y } else { y };
                    let sx = if flip_cols { out_cols - 1 - x } else { x };
                    let word = words[[sy / cell_rows, sx / cell_cols]];
                    let bit = self.layout[[sy % cell_rows, sx % cell_cols]];
                    *cell = ((word >> bit) & 1) as u8;
                }
            });

        let out = out.into_shape(IxDyn(&out_shape))?.into_dimensionality::<D>()?;
        Ok(out)
    }
}

/// Number of bits needed to represent `value`, at least 1.
fn bit_width(value: u32) -> u32 {
    (u32::BITS - value.leading_zeros()).max(1)
}
