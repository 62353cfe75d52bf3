//! Collaborator traits for the control loop and their error types.
//!
//! The loop only ever talks to hardware and the network through these, so
//! it can be driven by deterministic fakes in tests.

use std::fmt;
use std::time::Duration;

use binbin_core::{BinEvent, JpegImage};

/// Which piece of hardware failed to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Sensor,
    Camera,
}

impl Device {
    pub(crate) fn failure(self, message: impl Into<String>) -> AcquisitionError {
        match self {
            Device::Sensor => AcquisitionError::Sensor(message.into()),
            Device::Camera => AcquisitionError::Camera(message.into()),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Sensor => f.write_str("sensor"),
            Device::Camera => f.write_str("camera"),
        }
    }
}

/// The sensor or camera did not produce a reading/image. Recoverable.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("sensor read failed: {0}")]
    Sensor(String),

    #[error("camera capture failed: {0}")]
    Camera(String),

    #[error("{device} timed out after {after:?}")]
    Timeout { device: Device, after: Duration },

    #[error("failed to run {device} command: {error}")]
    Spawn {
        device: Device,
        #[source]
        error: std::io::Error,
    },
}

/// The sink rejected an event or could not be reached. Recoverable.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend rejected event with {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to encode event: {0}")]
    Encode(String),
}

/// Source of distance readings, called once per poll tick.
#[async_trait::async_trait]
pub trait DistanceSensor: Send {
    /// Current distance to the fill surface, in centimeters.
    async fn read_distance(&mut self) -> Result<f64, AcquisitionError>;

    fn name(&self) -> &str;
}

/// Source of images, called only when a deposit is confirmed.
#[async_trait::async_trait]
pub trait Camera: Send {
    async fn capture_image(&mut self) -> Result<JpegImage, AcquisitionError>;

    fn name(&self) -> &str;
}

/// Destination for classified events.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event. Deposit events may carry an image.
    async fn send(&self, event: &BinEvent) -> Result<(), DispatchError>;

    /// Human-readable name for this channel (e.g., "http", "log").
    fn channel_name(&self) -> &str;
}
