//! Fill & deposit detection for a single bin.
//!
//! Turns a noisy stream of distance readings into debounced events:
//! - `fill_level` for every sample
//! - `bin_full` when the distance is below the threshold, at most once per cooldown
//! - `deposit` after a sharp drop that then holds steady for several samples
//!
//! The crate does no I/O. [`step`] is the pure transition function;
//! [`FillDepositDetector`] owns the state across samples.

pub mod detector;
pub mod state;
pub mod transition;

pub use detector::{replay, FillDepositDetector};
pub use state::{Detection, DetectorState, Phase, Sample};
pub use transition::step;
