use chrono::{DateTime, Utc};

use binbin_core::{BinEvent, BinId, EventKind};

/// One distance reading and the instant it was taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub distance_cm: f64,
    pub at: DateTime<Utc>,
}

impl Sample {
    pub fn new(distance_cm: f64, at: DateTime<Utc>) -> Self {
        Self { distance_cm, at }
    }
}

/// Deposit-tracking phase.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Phase {
    #[default]
    Idle,
    /// An unconfirmed deposit: a sharp drop landed at `low_distance_cm` and
    /// has stayed within tolerance for `stable_count` samples since.
    Candidate {
        low_distance_cm: f64,
        stable_count: u32,
    },
}

impl Phase {
    pub fn is_candidate(&self) -> bool {
        matches!(self, Phase::Candidate { .. })
    }
}

/// Everything the detector remembers between samples.
///
/// `None` timestamps mean the event kind has never been emitted, so its
/// cooldown is already satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DetectorState {
    pub previous_distance_cm: Option<f64>,
    pub phase: Phase,
    pub last_full_emitted_at: Option<DateTime<Utc>>,
    pub last_deposit_emitted_at: Option<DateTime<Utc>>,
}

/// A classification decided for one sample, before any I/O.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub kind: EventKind,
    pub distance_cm: f64,
    pub at: DateTime<Utc>,
}

impl Detection {
    pub(crate) fn new(kind: EventKind, sample: Sample) -> Self {
        Self {
            kind,
            distance_cm: sample.distance_cm,
            at: sample.at,
        }
    }

    /// Build the outgoing event. Images are attached by the caller.
    pub fn into_event(self, bin_id: &BinId) -> BinEvent {
        BinEvent::new(bin_id.clone(), self.kind, self.distance_cm, self.at)
    }
}
