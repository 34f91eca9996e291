// src/catalog.rs

//! # Device catalog
//!
//! Named device parameters stored as a JSON object keyed by device name. The
//! crate ships a built-in table; callers may load their own files or extend a
//! catalog with custom (e.g. re-measured) devices.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::device::DeviceParams;
use crate::error::{PlmError, Result};

const BUILTIN_DEVICES: &str = include_str!("../data/devices.json");

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    devices: BTreeMap<String, DeviceParams>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The device table compiled into the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_DEVICES)
    }

    /// Parses a catalog. Entries without a `name` take their key as name.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut devices: BTreeMap<String, DeviceParams> = serde_json::from_str(json)?;
        for (key, params) in devices.iter_mut() {
            if params.name.is_empty() {
                params.name = key.clone();
            }
        }
        debug!(devices = devices.len(), "loaded device catalog");
        Ok(Self { devices })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        debug!(path = %path.display(), "reading device catalog");
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.devices)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    /// Parameters for `name`, or [`PlmError::UnknownDevice`] listing the known names.
    pub fn lookup(&self, name: &str) -> Result<&DeviceParams> {
        self.devices.get(name).ok_or_else(|| PlmError::UnknownDevice {
            name: name.to_string(),
            available: self.names(),
        })
    }

    /// Adds or replaces the entry keyed by `params.name`, returning the previous one.
    pub fn insert(&mut self, params: DeviceParams) -> Option<DeviceParams> {
        self.devices.insert(params.name.clone(), params)
    }

    pub fn remove(&mut self, name: &str) -> Option<DeviceParams> {
        self.devices.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.devices.contains_key(name)
    }

    /// Device names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.devices.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
