// src/device.rs

//! # Device profiles
//!
//! A [`DeviceProfile`] describes one physical PLM: its resolution, the measured
//! displacement of each phase state, and how memory words are laid out on the
//! electrodes under every mirror. Profiles are validated when they are built and
//! only change through [`DeviceProfile::update`], which revalidates everything and
//! recomputes the phase buckets before the new values become visible.

use std::collections::BTreeSet;
use std::fmt;

use ndarray::{Array, ArrayBase, ArrayD, ArrayView2, Data, Dimension};
use num_traits::Float;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::Catalog;
use crate::encode::ElectrodeEncoder;
use crate::error::{ConfigError, Result};
use crate::processor::{PhaseMapProcessor, ProcessOptions};
use crate::quantize::PhaseQuantizer;
use crate::TWO_PI;

/// Raw device parameters, as stored in a device catalog.
///
/// Nothing is validated here; build a [`DeviceProfile`] to check the invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceParams {
    #[serde(default)]
    pub name: String,
    /// (rows, columns)
    pub shape: (usize, usize),
    /// Mirror pitch as (vertical, horizontal), in meters.
    #[serde(default)]
    pub pitch: (f64, f64),
    #[serde(default = "default_phase_range")]
    pub phase_range: (f64, f64),
    pub displacement_ratios: Vec<f64>,
    pub memory_lut: Vec<u32>,
    /// Electrode location of each bit, e.g. `[[2, 3], [0, 1]]` puts bit 2 top-left
    /// and bit 1 bottom-right. Serialized as a nested list.
    #[serde(with = "nested_layout")]
    pub bitpack_layout: ArrayD<u32>,
    /// (vertical, horizontal) flip of the memory cell data.
    #[serde(default)]
    pub data_flip: (bool, bool),
}

fn default_phase_range() -> (f64, f64) {
    (0.0, TWO_PI)
}

impl DeviceParams {
    /// Applies every field set in `overrides` on top of these parameters.
    pub fn with_overrides(mut self, overrides: ProfileOverrides) -> Self {
        let ProfileOverrides {
            name,
            shape,
            pitch,
            phase_range,
            displacement_ratios,
            memory_lut,
            bitpack_layout,
            data_flip,
        } = overrides;

        if let Some(v) = name {
            self.name = v;
        }
        if let Some(v) = shape {
            self.shape = v;
        }
        if let Some(v) = pitch {
            self.pitch = v;
        }
        if let Some(v) = phase_range {
            self.phase_range = v;
        }
        if let Some(v) = displacement_ratios {
            self.displacement_ratios = v;
        }
        if let Some(v) = memory_lut {
            self.memory_lut = v;
        }
        if let Some(v) = bitpack_layout {
            self.bitpack_layout = v;
        }
        if let Some(v) = data_flip {
            self.data_flip = v;
        }
        self
    }
}

/// A device parameter, used to name fields in overrides and read-only locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Name,
    Shape,
    Pitch,
    PhaseRange,
    DisplacementRatios,
    MemoryLut,
    BitpackLayout,
    DataFlip,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Name,
        Field::Shape,
        Field::Pitch,
        Field::PhaseRange,
        Field::DisplacementRatios,
        Field::MemoryLut,
        Field::BitpackLayout,
        Field::DataFlip,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Shape => "shape",
            Field::Pitch => "pitch",
            Field::PhaseRange => "phase_range",
            Field::DisplacementRatios => "displacement_ratios",
            Field::MemoryLut => "memory_lut",
            Field::BitpackLayout => "bitpack_layout",
            Field::DataFlip => "data_flip",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-level overrides applied on top of a base set of [`DeviceParams`].
///
/// ```
/// use phase_light_modulator::{DeviceProfile, ProfileOverrides};
///
/// let measured = vec![0.0, 0.01395, 0.02863, 0.05992, 0.07348, 0.082216, 0.18364, 0.23701,
///                     0.316312, 0.38889, 0.40321, 0.51986, 0.5965, 0.68123, 0.89665, 1.0];
/// let plm = DeviceProfile::from_db("p67", ProfileOverrides::new().displacement_ratios(measured))?;
/// assert_eq!(plm.n_levels(), 16);
/// # Ok::<(), phase_light_modulator::PlmError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileOverrides {
    pub name: Option<String>,
    pub shape: Option<(usize, usize)>,
    pub pitch: Option<(f64, f64)>,
    pub phase_range: Option<(f64, f64)>,
    pub displacement_ratios: Option<Vec<f64>>,
    pub memory_lut: Option<Vec<u32>>,
    pub bitpack_layout: Option<ArrayD<u32>>,
    pub data_flip: Option<(bool, bool)>,
}

impl ProfileOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn shape(mut self, rows: usize, cols: usize) -> Self {
        self.shape = Some((rows, cols));
        self
    }

    pub fn pitch(mut self, vertical: f64, horizontal: f64) -> Self {
        self.pitch = Some((vertical, horizontal));
        self
    }

    pub fn phase_range(mut self, min: f64, max: f64) -> Self {
        self.phase_range = Some((min, max));
        self
    }

    pub fn displacement_ratios(mut self, ratios: Vec<f64>) -> Self {
        self.displacement_ratios = Some(ratios);
        self
    }

    pub fn memory_lut(mut self, lut: Vec<u32>) -> Self {
        self.memory_lut = Some(lut);
        self
    }

    /// Accepts a layout of any dimensionality so that non-2D layouts are reported
    /// as a configuration error rather than rejected by the type system.
    pub fn bitpack_layout<D: Dimension>(mut self, layout: Array<u32, D>) -> Self {
        self.bitpack_layout = Some(layout.into_dyn());
        self
    }

    pub fn data_flip(mut self, flip_rows: bool, flip_cols: bool) -> Self {
        self.data_flip = Some((flip_rows, flip_cols));
        self
    }

    /// Fields this override set touches.
    pub fn fields(&self) -> Vec<Field> {
        let set = [
            (Field::Name, self.name.is_some()),
            (Field::Shape, self.shape.is_some()),
            (Field::Pitch, self.pitch.is_some()),
            (Field::PhaseRange, self.phase_range.is_some()),
            (Field::DisplacementRatios, self.displacement_ratios.is_some()),
            (Field::MemoryLut, self.memory_lut.is_some()),
            (Field::BitpackLayout, self.bitpack_layout.is_some()),
            (Field::DataFlip, self.data_flip.is_some()),
        ];
        set.into_iter().filter_map(|(field, present)| present.then_some(field)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

/// A validated PLM description together with its derived quantization state.
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    params: DeviceParams,
    quantizer: PhaseQuantizer,
    encoder: ElectrodeEncoder,
    locked: BTreeSet<Field>,
}

impl DeviceProfile {
    /// Validates `params` and derives the phase buckets.
    pub fn new(params: DeviceParams) -> Result<Self> {
        let (rows, cols) = params.shape;
        if rows == 0 || cols == 0 {
            return Err(ConfigError::InvalidShape { rows, cols }.into());
        }

        let quantizer = PhaseQuantizer::new(&params.displacement_ratios, params.phase_range)?;

        if params.memory_lut.len() != quantizer.n_levels() {
            return Err(ConfigError::LutLengthMismatch {
                lut_len: params.memory_lut.len(),
                levels: quantizer.n_levels(),
            }
            .into());
        }

        let encoder = ElectrodeEncoder::new(
            params.memory_lut.clone(),
            params.bitpack_layout.clone(),
            params.data_flip,
        )?;

        debug!(
            device = %params.name,
            rows,
            cols,
            levels = quantizer.n_levels(),
            layout = ?encoder.layout().dim(),
            "validated device profile"
        );

        Ok(Self { params, quantizer, encoder, locked: BTreeSet::new() })
    }

    /// Looks up `name` in `catalog`, applies `overrides`, and builds the profile.
    ///
    /// Every field that came from the catalog is locked read-only afterwards;
    /// use [`DeviceProfile::unlock_fields`] to allow later updates.
    pub fn from_catalog(catalog: &Catalog, name: &str, overrides: ProfileOverrides) -> Result<Self> {
        let base = catalog.lookup(name)?.clone();
        let mut profile = Self::new(base.with_overrides(overrides))?;
        profile.lock_fields(Field::ALL);
        Ok(profile)
    }

    /// Same as [`DeviceProfile::from_catalog`] using the built-in device table.
    pub fn from_db(name: &str, overrides: ProfileOverrides) -> Result<Self> {
        Self::from_catalog(&Catalog::builtin()?, name, overrides)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::new(serde_json::from_str(json)?)
    }

    /// Serializes the parameters in catalog format. Field locks are not serialized.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.params)?)
    }

    /// Applies `overrides`, revalidating the whole profile.
    ///
    /// On error the profile is left exactly as it was.
    pub fn update(&mut self, overrides: ProfileOverrides) -> Result<()> {
        if let Some(field) = overrides.fields().into_iter().find(|f| self.locked.contains(f)) {
            return Err(ConfigError::ReadOnlyField(field).into());
        }
        if overrides.is_empty() {
            return Ok(());
        }

        let touched = overrides.fields();
        let mut updated = Self::new(self.params.clone().with_overrides(overrides))?;
        updated.locked = std::mem::take(&mut self.locked);
        *self = updated;

        debug!(device = %self.params.name, fields = ?touched, "updated device profile");
        Ok(())
    }

    pub fn lock_fields(&mut self, fields: impl IntoIterator<Item = Field>) {
        self.locked.extend(fields);
    }

    pub fn unlock_fields(&mut self, fields: impl IntoIterator<Item = Field>) {
        for field in fields {
            self.locked.remove(&field);
        }
    }

    pub fn is_locked(&self, field: Field) -> bool {
        self.locked.contains(&field)
    }

    pub fn params(&self) -> &DeviceParams {
        &self.params
    }

    pub fn name(&self) -> &str {
        &self.params.name
    }

    pub fn shape(&self) -> (usize, usize) {
        self.params.shape
    }

    pub fn pitch(&self) -> (f64, f64) {
        self.params.pitch
    }

    pub fn phase_range(&self) -> (f64, f64) {
        self.params.phase_range
    }

    pub fn displacement_ratios(&self) -> &[f64] {
        &self.params.displacement_ratios
    }

    pub fn memory_lut(&self) -> &[u32] {
        &self.params.memory_lut
    }

    pub fn bitpack_layout(&self) -> ArrayView2<'_, u32> {
        self.encoder.layout().view()
    }

    pub fn data_flip(&self) -> (bool, bool) {
        self.params.data_flip
    }

    /// Number of discrete displacement levels.
    pub fn n_levels(&self) -> usize {
        self.quantizer.n_levels()
    }

    /// Cached bucket boundaries used by [`DeviceProfile::quantize`].
    pub fn phase_buckets(&self) -> &[f64] {
        self.quantizer.buckets()
    }

    pub fn quantizer(&self) -> &PhaseQuantizer {
        &self.quantizer
    }

    pub fn encoder(&self) -> &ElectrodeEncoder {
        &self.encoder
    }

    pub fn quantize<A, S, D>(&self, phase_map: &ArrayBase<S, D>) -> Array<usize, D>
    where
        A: Float + Send + Sync,
        S: Data<Elem = A>,
        D: Dimension,
    {
        self.quantizer.quantize(phase_map)
    }

    /// Expands phase state indices into the electrode bitmap.
    pub fn bitpack<S, D>(&self, phase_state_idx: &ArrayBase<S, D>) -> Result<Array<u8, D>>
    where
        S: Data<Elem = usize>,
        D: Dimension,
    {
        self.encoder.encode(phase_state_idx)
    }

    pub fn processor(&self) -> PhaseMapProcessor<'_> {
        PhaseMapProcessor::new(self)
    }

    /// Quantizes and bitpacks `phase_map` for display on this device.
    pub fn process_phase_map<A, S, D>(
        &self,
        phase_map: &ArrayBase<S, D>,
        options: ProcessOptions,
    ) -> Result<Array<u8, D>>
    where
        A: Float + Send + Sync,
        S: Data<Elem = A>,
        D: Dimension,
    {
        self.processor().process(phase_map, options)
    }
}

impl fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (rows, cols) = self.shape();
        let (cell_rows, cell_cols) = self.encoder.layout().dim();
        write!(
            f,
            "PLM(name={:?}, shape=({rows}, {cols}), levels={}, layout={cell_rows}x{cell_cols})",
            self.name(),
            self.n_levels()
        )
    }
}

/// Serde adapter storing an n-dimensional layout as nested JSON lists.
mod nested_layout {
    use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    use crate::error::ConfigError;

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Nested {
        Bit(u32),
        List(Vec<Nested>),
    }

    fn to_nested(view: ArrayViewD<'_, u32>) -> Nested {
        if view.ndim() == 0 {
            Nested::Bit(view[IxDyn(&[])])
        } else {
            Nested::List(view.axis_iter(Axis(0)).map(to_nested).collect())
        }
    }

    fn shape_of(node: &Nested) -> Vec<usize> {
        let mut shape = Vec::new();
        let mut current = node;
        while let Nested::List(items) = current {
            shape.push(items.len());
            match items.first() {
                Some(first) => current = first,
                None => break,
            }
        }
        shape
    }

    fn flatten(node: &Nested, depth: usize, shape: &[usize], out: &mut Vec<u32>) -> Result<(), ConfigError> {
        match node {
            Nested::Bit(bit) if depth == shape.len() => {
                out.push(*bit);
                Ok(())
            }
            Nested::List(items) if depth < shape.len() && items.len() == shape[depth] => {
                items.iter().try_for_each(|item| flatten(item, depth + 1, shape, out))
            }
            _ => Err(ConfigError::RaggedLayout {
                reason: format!("inconsistent nesting at depth {depth}, expected shape {shape:?}"),
            }),
        }
    }

    pub fn serialize<S: Serializer>(layout: &ArrayD<u32>, serializer: S) -> Result<S::Ok, S::Error> {
        to_nested(layout.view()).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ArrayD<u32>, D::Error> {
        let node = Nested::deserialize(deserializer)?;
        let shape = shape_of(&node);
        let mut flat = Vec::with_capacity(shape.iter().product());
        flatten(&node, 0, &shape, &mut flat).map_err(<D::Error as de::Error>::custom)?;
        ArrayD::from_shape_vec(IxDyn(&shape), flat).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlmError;
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2, arr3};

    fn params() -> DeviceParams {
        DeviceParams {
            name: "test".into(),
            shape: (4, 6),
            pitch: (10.8e-6, 10.8e-6),
            phase_range: (0.0, TWO_PI),
            displacement_ratios: vec![0.0, 0.25, 0.5, 1.0],
            memory_lut: vec![0, 3, 1, 2],
            bitpack_layout: arr2(&[[1, 0]]).into_dyn(),
            data_flip: (false, false),
        }
    }

    #[test]
    fn test_profile_exposes_fields() {
        let plm = DeviceProfile::new(params()).unwrap();
        assert_eq!(plm.name(), "test");
        assert_eq!(plm.shape(), (4, 6));
        assert_eq!(plm.n_levels(), 4);
        assert_eq!(plm.bitpack_layout(), arr2(&[[1u32, 0]]));
        assert_eq!(plm.phase_buckets().len(), 4);
        assert!(!plm.is_locked(Field::Shape));
    }

    #[test]
    fn test_layout_must_be_2d() {
        let mut p = params();
        p.bitpack_layout = arr3(&[[[0u32, 1]]]).into_dyn();
        let err = DeviceProfile::new(p).unwrap_err();
        assert!(matches!(
            err,
            PlmError::Config(ConfigError::LayoutNotTwoDimensional { ndim: 3, .. })
        ));
    }

    #[test]
    fn test_lut_length_must_match_levels() {
        let mut p = params();
        p.memory_lut.pop();
        let err = DeviceProfile::new(p).unwrap_err();
        assert!(matches!(
            err,
            PlmError::Config(ConfigError::LutLengthMismatch { lut_len: 3, levels: 4 })
        ));
    }

    #[test]
    fn test_zero_shape_rejected() {
        let mut p = params();
        p.shape = (0, 6);
        assert!(matches!(
            DeviceProfile::new(p),
            Err(PlmError::Config(ConfigError::InvalidShape { rows: 0, cols: 6 }))
        ));
    }

    #[test]
    fn test_update_recomputes_buckets() {
        let mut plm = DeviceProfile::new(params()).unwrap();
        let before = plm.phase_buckets().to_vec();

        plm.update(ProfileOverrides::new().phase_range(0.0, 1.0)).unwrap();
        let after = arr1(plm.phase_buckets());
        let expected = arr1(&before).mapv(|b| b / TWO_PI);
        assert_relative_eq!(after, expected, epsilon = 1e-12);
        assert_eq!(plm.quantizer().phase_range(), (0.0, 1.0));
    }

    #[test]
    fn test_failed_update_leaves_profile_untouched() {
        let mut plm = DeviceProfile::new(params()).unwrap();
        let err = plm
            .update(ProfileOverrides::new().displacement_ratios(vec![0.0, 0.5, 0.4, 1.0]))
            .unwrap_err();
        assert!(matches!(
            err,
            PlmError::Config(ConfigError::NonIncreasingDisplacementRatios { index: 2, .. })
        ));
        assert_eq!(plm.displacement_ratios(), &[0.0, 0.25, 0.5, 1.0]);
    }

    #[test]
    fn test_locked_fields_are_read_only() {
        let mut plm = DeviceProfile::new(params()).unwrap();
        plm.lock_fields([Field::MemoryLut]);

        let err = plm.update(ProfileOverrides::new().memory_lut(vec![3, 2, 1, 0])).unwrap_err();
        assert!(matches!(err, PlmError::Config(ConfigError::ReadOnlyField(Field::MemoryLut))));

        plm.update(ProfileOverrides::new().name("renamed")).unwrap();
        assert_eq!(plm.name(), "renamed");
        assert!(plm.is_locked(Field::MemoryLut));

        plm.unlock_fields([Field::MemoryLut]);
        plm.update(ProfileOverrides::new().memory_lut(vec![3, 2, 1, 0])).unwrap();
        assert_eq!(plm.memory_lut(), &[3, 2, 1, 0]);
    }

    #[test]
    fn test_overrides_report_fields() {
        let overrides = ProfileOverrides::new().shape(2, 2).data_flip(true, false);
        assert_eq!(overrides.fields(), vec![Field::Shape, Field::DataFlip]);
        assert!(ProfileOverrides::new().is_empty());
    }

    #[test]
    fn test_layout_serializes_as_nested_list() {
        let plm = DeviceProfile::new(params()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&plm.to_json().unwrap()).unwrap();
        assert_eq!(json["bitpack_layout"], serde_json::json!([[1, 0]]));
        assert_eq!(json["shape"], serde_json::json!([4, 6]));
    }

    #[test]
    fn test_ragged_layout_is_rejected() {
        let json = r#"{
            "shape": [2, 2],
            "displacement_ratios": [0.0, 1.0],
            "memory_lut": [0, 1],
            "bitpack_layout": [[0, 1], [2]]
        }"#;
        let err = DeviceProfile::from_json(json).unwrap_err();
        assert!(matches!(err, PlmError::Json(_)));
        assert!(err.to_string().contains("not rectangular"));
    }

    #[test]
    fn test_one_dimensional_json_layout_is_config_error() {
        let json = r#"{
            "shape": [2, 2],
            "displacement_ratios": [0.0, 1.0],
            "memory_lut": [0, 1],
            "bitpack_layout": [0]
        }"#;
        let err = DeviceProfile::from_json(json).unwrap_err();
        assert!(matches!(
            err,
            PlmError::Config(ConfigError::LayoutNotTwoDimensional { ndim: 1, .. })
        ));
    }

    #[test]
    fn test_json_defaults() {
        let json = r#"{
            "shape": [2, 3],
            "displacement_ratios": [0.0, 1.0],
            "memory_lut": [0, 1],
            "bitpack_layout": [[0]]
        }"#;
        let plm = DeviceProfile::from_json(json).unwrap();
        assert_eq!(plm.phase_range(), (0.0, TWO_PI));
        assert_eq!(plm.data_flip(), (false, false));
        assert_eq!(plm.name(), "");
    }
}
