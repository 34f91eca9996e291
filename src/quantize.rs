// src/quantize.rs

//! # Phase quantization
//!
//! Maps continuous phase values onto the discrete displacement levels of a
//! device. Bucket boundaries sit halfway between neighbouring levels, and the
//! top of the phase range is reserved as a wrap zone so the highest and lowest
//! levels are treated as phase-adjacent.

use ndarray::{Array, ArrayBase, Data, Dimension, Zip};
use num_traits::Float;

use crate::error::ConfigError;

/// Bucket boundaries derived from a device's displacement table.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseQuantizer {
    buckets: Vec<f64>,
    phase_range: (f64, f64),
}

impl PhaseQuantizer {
    /// Builds the bucket table.
    ///
    /// # Arguments
    /// * `displacement_ratios` - normalized mirror positions in `[0, 1]`, strictly increasing.
    /// * `phase_range` - `(min, max)` of the accepted phase values.
    pub fn new(displacement_ratios: &[f64], phase_range: (f64, f64)) -> Result<Self, ConfigError> {
        let (lo, hi) = phase_range;
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(ConfigError::InvalidPhaseRange { min: lo, max: hi });
        }
        if displacement_ratios.is_empty() {
            return Err(ConfigError::EmptyDisplacementRatios);
        }
        for (index, &value) in displacement_ratios.iter().enumerate() {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::DisplacementRatioOutOfRange { index, value });
            }
        }
        if let Some(index) = displacement_ratios.windows(2).position(|w| w[1] <= w[0]) {
            return Err(ConfigError::NonIncreasingDisplacementRatios {
                index: index + 1,
                prev: displacement_ratios[index],
                next: displacement_ratios[index + 1],
            });
        }

        // the full displacement range spans one level less than the available depth,
        // leaving [scaled[n-1], hi) as the wrap zone back to level 0
        let n = displacement_ratios.len() as f64;
        let span = hi - lo;
        let mut levels: Vec<f64> = displacement_ratios
            .iter()
            .map(|ratio| lo + ratio * (n - 1.0) / n * span)
            .collect();
        levels.push(hi);

        let buckets = levels.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();

        Ok(Self { buckets, phase_range })
    }

    pub fn n_levels(&self) -> usize {
        self.buckets.len()
    }

    pub fn buckets(&self) -> &[f64] {
        &self.buckets
    }

    pub fn phase_range(&self) -> (f64, f64) {
        self.phase_range
    }

    /// Level index of a single phase value.
    ///
    /// Bins are right-open: a value equal to a boundary falls in the bin above it.
    /// Values past the last boundary wrap to level 0, and so does NaN.
    #[inline]
    pub fn level_of(&self, phase: f64) -> usize {
        self.buckets.partition_point(|&boundary| boundary <= phase) % self.n_levels()
    }

    /// Quantizes every element of `phase_map` into a phase state index in `[0, n_levels)`.
    ///
    /// Works on any dimensionality; the output has the same shape as the input.
    pub fn quantize<A, S, D>(&self, phase_map: &ArrayBase<S, D>) -> Array<usize, D>
    where
        A: Float + Send + Sync,
        S: Data<Elem = A>,
        D: Dimension,
    {
        let mut out = Array::zeros(phase_map.raw_dim());
        Zip::from(&mut out).and(phase_map).par_for_each(|level, &phase| {
            *level = self.level_of(phase.to_f64().unwrap_or(f64::NAN));
        });
        out
    }
}
