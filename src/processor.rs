// src/processor.rs

//! Phase map → device bitmap pipeline.

use ndarray::{Array, ArrayBase, Data, Dimension};
use num_traits::Float;
use rayon::prelude::*;
use tracing::{trace, warn};

use crate::bitplane;
use crate::device::DeviceProfile;
use crate::error::{PlmError, Result};

/// Controls for [`PhaseMapProcessor::process`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Multiply the final bitplane by 255 (0b11111111) so the same CGH is shown
    /// for the full frame time.
    pub replicate_bits: bool,
    /// Require the last two dimensions of the phase map to match the device shape.
    pub enforce_shape: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self { replicate_bits: true, enforce_shape: true }
    }
}

impl ProcessOptions {
    pub fn replicate_bits(mut self, replicate_bits: bool) -> Self {
        self.replicate_bits = replicate_bits;
        self
    }

    pub fn enforce_shape(mut self, enforce_shape: bool) -> Self {
        self.enforce_shape = enforce_shape;
        self
    }
}

/// Runs quantization and electrode encoding for one device.
#[derive(Debug, Clone, Copy)]
pub struct PhaseMapProcessor<'a> {
    profile: &'a DeviceProfile,
}

impl<'a> PhaseMapProcessor<'a> {
    pub fn new(profile: &'a DeviceProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &'a DeviceProfile {
        self.profile
    }

    /// Processes an array of phase data into a bitmap for display on the device.
    ///
    /// `phase_map` may carry leading axes (e.g. channel, row, column); the last
    /// two are always row and column. With `enforce_shape` a resolution mismatch
    /// fails before any work is done.
    pub fn process<A, S, D>(&self, phase_map: &ArrayBase<S, D>, options: ProcessOptions) -> Result<Array<u8, D>>
    where
        A: Float + Send + Sync,
        S: Data<Elem = A>,
        D: Dimension,
    {
        self.check_shape(phase_map.shape(), options.enforce_shape)?;

        let phase_state_idx = self.profile.quantize(phase_map);
        let mut out = self.profile.bitpack(&phase_state_idx)?;

        if options.replicate_bits {
            out.par_mapv_inplace(|bit| bit * u8::MAX);
        }

        trace!(
            device = %self.profile.name(),
            input = ?phase_map.shape(),
            output = ?out.shape(),
            replicate = options.replicate_bits,
            "processed phase map"
        );
        Ok(out)
    }

    /// Processes several phase frames and multiplexes them into 8-bit frames.
    ///
    /// Each frame is encoded without bit replication and becomes one bit-plane,
    /// assigned in order starting at bit 0. The result holds `ceil(N / 8)` frames.
    pub fn process_multiplexed<A, S, D>(
        &self,
        frames: &[ArrayBase<S, D>],
        enforce_shape: bool,
    ) -> Result<Array<u8, D::Larger>>
    where
        A: Float + Send + Sync,
        S: Data<Elem = A> + Sync,
        D: Dimension,
    {
        let options = ProcessOptions { replicate_bits: false, enforce_shape };
        let planes = frames
            .par_iter()
            .map(|frame| self.process(frame, options))
            .collect::<Result<Vec<_>>>()?;
        bitplane::pack(&planes)
    }

    fn check_shape(&self, actual: &[usize], enforce: bool) -> Result<()> {
        let (rows, cols) = self.profile.shape();
        let ndim = actual.len();
        let matches = ndim >= 2 && actual[ndim - 2] == rows && actual[ndim - 1] == cols;
        if matches {
            return Ok(());
        }
        if enforce {
            return Err(PlmError::ShapeMismatch { expected: vec![rows, cols], actual: actual.to_vec() });
        }
        warn!(
            device = %self.profile.name(),
            expected = ?(rows, cols),
            actual = ?actual,
            "phase map shape differs from device shape; shape enforcement is disabled"
        );
        Ok(())
    }
}
