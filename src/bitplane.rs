// src/bitplane.rs

//! # Bit-plane multiplexing
//!
//! Packs single-bit frames into byte-wide frames, 8 planes per byte, for
//! time-multiplexed display. Plane `i` of each group of eight lands in bit `i`.

use ndarray::{Array, ArrayBase, ArrayD, Axis, Data, Dimension, IxDyn, Zip};
use num_integer::Integer;
use rayon::prelude::*;

use crate::error::{PlmError, Result};

/// Number of single-bit planes that fit in one output frame.
pub const PLANES_PER_FRAME: usize = u8::BITS as usize;

/// Packs `bitmaps` into `ceil(N / 8)` byte frames stacked along a new leading axis.
///
/// Every bitmap must have the same shape and hold only 0 or 1. Any other value is
/// rejected with [`PlmError::NonBinaryPlane`] rather than folded into
/// neighbouring bits. Unused high bits of the last frame are 0.
pub fn pack<S, D>(bitmaps: &[ArrayBase<S, D>]) -> Result<Array<u8, D::Larger>>
where
    S: Data<Elem = u8> + Sync,
    D: Dimension,
{
    let first = bitmaps.first().ok_or(PlmError::EmptyPlaneStack)?;
    let plane_shape = first.shape();

    for (plane, bitmap) in bitmaps.iter().enumerate() {
        if bitmap.shape() != plane_shape {
            return Err(PlmError::ShapeMismatch {
                expected: plane_shape.to_vec(),
                actual: bitmap.shape().to_vec(),
            });
        }
        if let Some(&value) = bitmap.iter().find(|&&v| v > 1) {
            return Err(PlmError::NonBinaryPlane { plane, value });
        }
    }

    let frames = Integer::div_ceil(&bitmaps.len(), &PLANES_PER_FRAME);
    let mut shape = Vec::with_capacity(plane_shape.len() + 1);
    shape.push(frames);
    shape.extend_from_slice(plane_shape);

    let mut out = ArrayD::<u8>::zeros(IxDyn(&shape));
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(bitmaps.par_chunks(PLANES_PER_FRAME))
        .for_each(|(mut frame, group)| {
            for (bit, bitmap) in group.iter().enumerate() {
                Zip::from(&mut frame)
                    .and(&bitmap.view().into_dyn())
                    .for_each(|packed, &b| *packed |= b << bit);
            }
        });

    Ok(out.into_dimensionality::<D::Larger>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array2};

    #[test]
    fn test_bits_follow_input_order() {
        let planes = vec![
            arr2(&[[1u8, 0], [0, 0]]),
            arr2(&[[0u8, 1], [0, 0]]),
            arr2(&[[0u8, 0], [1, 0]]),
            arr2(&[[1u8, 1], [1, 1]]),
        ];
        let packed = pack(&planes).unwrap();
        assert_eq!(packed.shape(), &[1, 2, 2]);
        assert_eq!(packed.index_axis(Axis(0), 0), arr2(&[[0b1001u8, 0b1010], [0b1100, 0b1000]]));
    }

    #[test]
    fn test_ninth_plane_starts_new_frame() {
        let mut planes = vec![Array2::<u8>::zeros((3, 3)); 8];
        planes.push(Array2::ones((3, 3)));
        let packed = pack(&planes).unwrap();
        assert_eq!(packed.shape(), &[2, 3, 3]);
        assert!(packed.index_axis(Axis(0), 0).iter().all(|&v| v == 0));
        assert!(packed.index_axis(Axis(0), 1).iter().all(|&v| v == 1));
    }

    #[test]
    fn test_non_binary_plane_rejected() {
        let planes = vec![Array2::<u8>::zeros((2, 2)), Array2::from_elem((2, 2), 255)];
        let err = pack(&planes).unwrap_err();
        assert!(matches!(err, PlmError::NonBinaryPlane { plane: 1, value: 255 }));
    }

    #[test]
    fn test_mismatched_planes_rejected() {
        let planes = vec![Array2::<u8>::zeros((2, 2)), Array2::zeros((2, 3))];
        let err = pack(&planes).unwrap_err();
        assert!(matches!(err, PlmError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_empty_stack_rejected() {
        let planes: Vec<Array2<u8>> = Vec::new();
        assert!(matches!(pack(&planes), Err(PlmError::EmptyPlaneStack)));
    }
}
