//! semroute core — the dense encoder contract, error taxonomy, provider
//! defaults and compute device detection shared by all encoder backends.

pub mod capabilities;
pub mod config;
pub mod encoder;
pub mod error;

pub use capabilities::{select_device, ComputeDevice, DeviceProbe, SystemProbe};
pub use config::{EncoderDefault, EncoderSettings, LocalSettings, MistralSettings, Provider};
pub use encoder::{DenseEncoder, EncoderType};
pub use error::{EncoderError, Result};
