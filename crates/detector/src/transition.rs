//! Single-step transition function for the fill & deposit state machine.
//!
//! [`step`] is pure: given the previous state, one sample and the
//! thresholds, it returns the next state and the detections for that
//! sample, in emission order (`fill_level`, then `bin_full`, then
//! `deposit`). Camera capture and delivery happen in the caller.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use binbin_core::{DetectorConfig, EventKind};

use crate::state::{Detection, DetectorState, Phase, Sample};

/// Advance the state machine by one sample.
pub fn step(
    state: DetectorState,
    sample: Sample,
    config: &DetectorConfig,
) -> (DetectorState, Vec<Detection>) {
    let d = sample.distance_cm;
    let mut next = state;
    let mut detections = Vec::with_capacity(1);

    detections.push(Detection::new(EventKind::FillLevel, sample));

    // Full detection fires on every qualifying sample once the cooldown
    // has elapsed, not only on a threshold crossing.
    if d < config.full_threshold_cm
        && cooldown_elapsed(next.last_full_emitted_at, sample.at, config.full_event_cooldown)
    {
        detections.push(Detection::new(EventKind::BinFull, sample));
        next.last_full_emitted_at = Some(sample.at);
    }

    if let Some(previous) = next.previous_distance_cm {
        next.phase = match next.phase {
            Phase::Idle => {
                let drop = previous - d;
                if drop >= config.deposit_drop_cm
                    && cooldown_elapsed(
                        next.last_deposit_emitted_at,
                        sample.at,
                        config.deposit_cooldown,
                    )
                {
                    debug!(drop_cm = drop, low_cm = d, "deposit candidate started");
                    Phase::Candidate {
                        low_distance_cm: d,
                        stable_count: 0,
                    }
                } else {
                    Phase::Idle
                }
            }
            Phase::Candidate {
                low_distance_cm,
                stable_count,
            } => {
                if (d - low_distance_cm).abs() <= config.stability_tolerance_cm {
                    let stable_count = stable_count + 1;
                    if stable_count >= config.deposit_stable_samples {
                        debug!(low_cm = low_distance_cm, stable_count, "deposit confirmed");
                        detections.push(Detection::new(EventKind::Deposit, sample));
                        next.last_deposit_emitted_at = Some(sample.at);
                        Phase::Idle
                    } else {
                        Phase::Candidate {
                            low_distance_cm,
                            stable_count,
                        }
                    }
                } else {
                    // Discarded; this sample is not re-checked as a new drop.
                    debug!(
                        low_cm = low_distance_cm,
                        distance_cm = d,
                        "deposit candidate unstable, reset"
                    );
                    Phase::Idle
                }
            }
        };
    }

    next.previous_distance_cm = Some(d);
    (next, detections)
}

/// Strictly more than `cooldown` has passed since `last`, or it never happened.
fn cooldown_elapsed(last: Option<DateTime<Utc>>, now: DateTime<Utc>, cooldown: Duration) -> bool {
    let Some(last) = last else {
        return true;
    };
    match chrono::Duration::from_std(cooldown) {
        Ok(cooldown) => now.signed_duration_since(last) > cooldown,
        Err(_) => false,
    }
}
