//! Device database behaviour: lookup, overrides, read-only fields and JSON round trips.

use phase_light_modulator::{
    Catalog, ConfigError, DeviceProfile, Field, PlmError, ProfileOverrides,
};

const MEASURED_RATIOS: [f64; 16] = [
    0.0, 0.01395, 0.02863, 0.05992, 0.07348, 0.082216, 0.18364, 0.23701, 0.316312, 0.38889,
    0.40321, 0.51986, 0.5965, 0.68123, 0.89665, 1.0,
];

#[test]
fn test_from_db_builds_p67() {
    let plm = DeviceProfile::from_db("p67", ProfileOverrides::default()).unwrap();
    assert_eq!(plm.name(), "p67");
    assert_eq!(plm.n_levels(), 16);
    assert_eq!(plm.bitpack_layout().dim(), (2, 2));
    for field in Field::ALL {
        assert!(plm.is_locked(field), "{field} should be read-only");
    }
}

#[test]
fn test_unknown_device_names_the_alternatives() {
    let err = DeviceProfile::from_db("p99", ProfileOverrides::default()).unwrap_err();
    assert!(matches!(&err, PlmError::UnknownDevice { name, .. } if name == "p99"));
    assert!(err.to_string().contains("p67"));
}

#[test]
fn test_catalog_fields_are_read_only_after_construction() {
    let mut plm = DeviceProfile::from_db("p67", ProfileOverrides::default()).unwrap();
    let err = plm
        .update(ProfileOverrides::new().displacement_ratios(MEASURED_RATIOS.to_vec()))
        .unwrap_err();
    assert!(matches!(
        err,
        PlmError::Config(ConfigError::ReadOnlyField(Field::DisplacementRatios))
    ));
}

#[test]
fn test_custom_device_round_trip() {
    // p67 with re-measured displacement levels
    let custom = DeviceProfile::from_db(
        "p67",
        ProfileOverrides::new().displacement_ratios(MEASURED_RATIOS.to_vec()),
    )
    .unwrap();
    let json = custom.to_json().unwrap();

    let mut restored = DeviceProfile::from_json(&json).unwrap();
    assert_eq!(restored.params(), custom.params());
    assert_eq!(restored.phase_buckets(), custom.phase_buckets());
    assert!(!restored.is_locked(Field::Name));

    restored.update(ProfileOverrides::new().name("Custom p67")).unwrap();
    assert_eq!(restored.name(), "Custom p67");
    assert_eq!(restored.displacement_ratios(), &MEASURED_RATIOS[..]);
}

#[test]
fn test_catalog_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("devices.json");

    let mut catalog = Catalog::builtin().unwrap();
    let mut custom = catalog.lookup("p67").unwrap().clone();
    custom.name = "p67-bench".into();
    custom.displacement_ratios = MEASURED_RATIOS.to_vec();
    catalog.insert(custom);
    catalog.save(&path).unwrap();

    let loaded = Catalog::from_path(&path).unwrap();
    assert_eq!(loaded, catalog);

    let plm = DeviceProfile::from_catalog(&loaded, "p67-bench", ProfileOverrides::default()).unwrap();
    assert_eq!(plm.displacement_ratios(), &MEASURED_RATIOS[..]);
}

#[test]
fn test_missing_catalog_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Catalog::from_path(dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, PlmError::Io(_)));
}

#[test]
fn test_invalid_override_is_config_error() {
    let err = DeviceProfile::from_db(
        "p67",
        ProfileOverrides::new().displacement_ratios(vec![0.0, 0.5, 0.25]),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        PlmError::Config(ConfigError::NonIncreasingDisplacementRatios { index: 2, .. })
    ));
}
