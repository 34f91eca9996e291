//! # phase_light_modulator
//!
//! Converts floating point phase maps into the binary bitmaps that drive a
//! phase light modulator (PLM): phases are quantized to the device's discrete
//! displacement levels, each level is expanded into its electrode memory
//! pattern, and single-bit frames can be multiplexed into 8-bit frames.
//!
//! ```
//! use ndarray::Array2;
//! use phase_light_modulator::{DeviceProfile, ProcessOptions, ProfileOverrides};
//!
//! let plm = DeviceProfile::from_db("p67", ProfileOverrides::default())?;
//! let (rows, cols) = plm.shape();
//! let phase = Array2::<f64>::zeros((rows, cols));
//! let bitmap = plm.process_phase_map(&phase, ProcessOptions::default())?;
//! assert_eq!(bitmap.dim(), (rows * 2, cols * 2));
//! # Ok::<(), phase_light_modulator::PlmError>(())
//! ```

pub mod bitplane;
pub mod catalog;
pub mod device;
pub mod encode;
pub mod error;
pub mod processor;
pub mod quantize;

#[cfg(feature = "python")]
mod bindings;

pub use bitplane::{pack as bitstack, PLANES_PER_FRAME};
pub use catalog::Catalog;
pub use device::{DeviceParams, DeviceProfile, Field, ProfileOverrides};
pub use encode::ElectrodeEncoder;
pub use error::{ConfigError, PlmError, Result};
pub use processor::{PhaseMapProcessor, ProcessOptions};
pub use quantize::PhaseQuantizer;

pub const TWO_PI: f64 = std::f64::consts::TAU;
