//! Device side of the bin: drives the detector from real hardware.
//!
//! This crate provides:
//! - `DistanceSensor`, `Camera` and `EventSink` traits for the loop's collaborators
//! - Command-backed sensor and camera drivers
//! - HTTP and logging event sinks
//! - The single-threaded `ControlLoop`
//! - Offline replay of recorded readings

mod command;

pub mod camera;
pub mod replay;
pub mod runner;
pub mod sensor;
pub mod sink;
pub mod traits;

pub use camera::CommandCamera;
pub use runner::{ControlLoop, LoopStats, TickReport};
pub use sensor::CommandSensor;
pub use sink::{HttpEventSink, LogSink};
pub use traits::{AcquisitionError, Camera, Device, DispatchError, DistanceSensor, EventSink};
