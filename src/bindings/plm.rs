// src/bindings/plm.rs

use ndarray::{Array2, ArrayD};
use numpy::{IntoPyArray, PyArray2, PyArrayDyn, PyReadonlyArrayDyn, ToPyArray};
use pyo3::prelude::*;

use crate::device::{DeviceParams, DeviceProfile, ProfileOverrides};
use crate::error::{ConfigError, PlmError};
use crate::processor::ProcessOptions;
use crate::TWO_PI;

#[pyclass(name = "PLM", module = "phase_light_modulator")]
pub struct PyPlm {
    inner: DeviceProfile,
}

fn layout_from_rows(rows: Vec<Vec<u32>>) -> PyResult<ArrayD<u32>> {
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != n_cols) {
        let err = ConfigError::RaggedLayout { reason: "rows have different lengths".into() };
        return Err(PlmError::from(err).into());
    }
    let flat: Vec<u32> = rows.into_iter().flatten().collect();
    let layout = Array2::from_shape_vec((n_rows, n_cols), flat).map_err(PlmError::from)?;
    Ok(layout.into_dyn())
}

#[pymethods]
impl PyPlm {
    #[new]
    #[pyo3(signature = (
        shape,
        displacement_ratios,
        memory_lut,
        bitpack_layout,
        phase_range = (0.0, TWO_PI),
        pitch = (0.0, 0.0),
        data_flip = (false, false),
        name = String::new()
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        shape: (usize, usize),
        displacement_ratios: Vec<f64>,
        memory_lut: Vec<u32>,
        bitpack_layout: Vec<Vec<u32>>,
        phase_range: (f64, f64),
        pitch: (f64, f64),
        data_flip: (bool, bool),
        name: String,
    ) -> PyResult<Self> {
        let params = DeviceParams {
            name,
            shape,
            pitch,
            phase_range,
            displacement_ratios,
            memory_lut,
            bitpack_layout: layout_from_rows(bitpack_layout)?,
            data_flip,
        };
        Ok(Self { inner: DeviceProfile::new(params)? })
    }

    /// Creates a PLM from a device name in the built-in database.
    #[staticmethod]
    #[pyo3(signature = (name, displacement_ratios = None, phase_range = None, data_flip = None))]
    fn from_db(
        name: &str,
        displacement_ratios: Option<Vec<f64>>,
        phase_range: Option<(f64, f64)>,
        data_flip: Option<(bool, bool)>,
    ) -> PyResult<Self> {
        let overrides = ProfileOverrides { displacement_ratios, phase_range, data_flip, ..Default::default() };
        Ok(Self { inner: DeviceProfile::from_db(name, overrides)? })
    }

    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        Ok(Self { inner: DeviceProfile::from_json(json)? })
    }

    fn to_json(&self) -> PyResult<String> {
        Ok(self.inner.to_json()?)
    }

    #[getter]
    fn name(&self) -> String {
        self.inner.name().to_string()
    }

    #[getter]
    fn shape(&self) -> (usize, usize) {
        self.inner.shape()
    }

    #[getter]
    fn pitch(&self) -> (f64, f64) {
        self.inner.pitch()
    }

    #[getter]
    fn phase_range(&self) -> (f64, f64) {
        self.inner.phase_range()
    }

    #[getter]
    fn displacement_ratios(&self) -> Vec<f64> {
        self.inner.displacement_ratios().to_vec()
    }

    #[getter]
    fn memory_lut(&self) -> Vec<u32> {
        self.inner.memory_lut().to_vec()
    }

    #[getter]
    fn bitpack_layout<'py>(&self, py: Python<'py>) -> &'py PyArray2<u32> {
        self.inner.bitpack_layout().to_pyarray(py)
    }

    #[getter]
    fn data_flip(&self) -> (bool, bool) {
        self.inner.data_flip()
    }

    #[getter]
    fn n_levels(&self) -> usize {
        self.inner.n_levels()
    }

    #[getter]
    fn phase_buckets(&self) -> Vec<f64> {
        self.inner.phase_buckets().to_vec()
    }

    fn quantize<'py>(&self, py: Python<'py>, phase_map: PyReadonlyArrayDyn<'py, f64>) -> &'py PyArrayDyn<usize> {
        self.inner.quantize(&phase_map.as_array()).into_pyarray(py)
    }

    fn bitpack<'py>(
        &self,
        py: Python<'py>,
        phase_state_idx: PyReadonlyArrayDyn<'py, usize>,
    ) -> PyResult<&'py PyArrayDyn<u8>> {
        let out = self.inner.bitpack(&phase_state_idx.as_array())?;
        Ok(out.into_pyarray(py))
    }

    #[pyo3(signature = (phase_map, replicate_bits = true, enforce_shape = true))]
    fn process_phase_map<'py>(
        &self,
        py: Python<'py>,
        phase_map: PyReadonlyArrayDyn<'py, f64>,
        replicate_bits: bool,
        enforce_shape: bool,
    ) -> PyResult<&'py PyArrayDyn<u8>> {
        let options = ProcessOptions { replicate_bits, enforce_shape };
        let out = self.inner.process_phase_map(&phase_map.as_array(), options)?;
        Ok(out.into_pyarray(py))
    }

    #[staticmethod]
    fn bitstack<'py>(py: Python<'py>, bitmaps: Vec<PyReadonlyArrayDyn<'py, u8>>) -> PyResult<&'py PyArrayDyn<u8>> {
        super::pack_arrays(py, bitmaps)
    }

    fn __repr__(&self) -> String {
        self.inner.to_string()
    }
}
