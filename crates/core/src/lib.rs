//! Shared types for the bin device: configuration, events and errors.

pub mod config;
pub mod duration;
pub mod error;
pub mod event;

pub use config::{
    load_dotenv, CameraConfig, DetectorConfig, DeviceConfig, SensorConfig, STABILITY_TOLERANCE_CM,
};
pub use error::ConfigError;
pub use event::{BinEvent, BinId, EventKind, JpegImage};
