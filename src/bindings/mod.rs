// src/bindings/mod.rs

//! # Python bindings
//!
//! Exposes the PLM pipeline to Python through `pyo3` and `numpy`, keeping the
//! method names of the original Python package (`quantize`, `bitpack`,
//! `process_phase_map`, `bitstack`, `from_db`).

mod plm;

pub use plm::PyPlm;

use numpy::{IntoPyArray, PyArrayDyn, PyReadonlyArrayDyn};
use pyo3::exceptions::{PyKeyError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyModule;

use crate::error::PlmError;

impl From<PlmError> for PyErr {
    fn from(err: PlmError) -> PyErr {
        match &err {
            PlmError::UnknownDevice { .. } => PyKeyError::new_err(err.to_string()),
            PlmError::Io(_) => pyo3::exceptions::PyIOError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

pub(crate) fn pack_arrays<'py>(
    py: Python<'py>,
    bitmaps: Vec<PyReadonlyArrayDyn<'py, u8>>,
) -> PyResult<&'py PyArrayDyn<u8>> {
    let views: Vec<_> = bitmaps.iter().map(|b| b.as_array()).collect();
    let packed = crate::bitplane::pack(&views)?;
    Ok(packed.into_pyarray(py))
}

/// Packs a list of 0/1 bitmaps into 8-bit frames.
#[pyfunction]
fn bitstack<'py>(py: Python<'py>, bitmaps: Vec<PyReadonlyArrayDyn<'py, u8>>) -> PyResult<&'py PyArrayDyn<u8>> {
    pack_arrays(py, bitmaps)
}

#[pymodule]
pub fn phase_light_modulator(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("TWO_PI", crate::TWO_PI)?;
    m.add_class::<PyPlm>()?;
    m.add_function(wrap_pyfunction!(bitstack, m)?)?;
    Ok(())
}
