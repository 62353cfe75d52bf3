use binbin_core::DetectorConfig;

use crate::state::{Detection, DetectorState, Phase, Sample};
use crate::transition::step;

/// Owns one bin's thresholds and state for the lifetime of the process.
pub struct FillDepositDetector {
    config: DetectorConfig,
    state: DetectorState,
}

impl FillDepositDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            state: DetectorState::default(),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Feed one sample and return what it produced, in emission order.
    pub fn observe(&mut self, sample: Sample) -> Vec<Detection> {
        let (next, detections) = step(self.state, sample, &self.config);
        self.state = next;
        detections
    }
}

/// Run a whole sample sequence through a fresh detector.
pub fn replay(
    config: &DetectorConfig,
    samples: impl IntoIterator<Item = Sample>,
) -> Vec<Detection> {
    let mut detector = FillDepositDetector::new(config.clone());
    samples
        .into_iter()
        .flat_map(|sample| detector.observe(sample))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn observe_carries_state_forward() {
        let mut detector = FillDepositDetector::new(DetectorConfig::new(15.0));
        let t0 = Utc.timestamp_opt(1_760_000_000, 0).unwrap();

        detector.observe(Sample::new(40.0, t0));
        assert_eq!(detector.state().previous_distance_cm, Some(40.0));

        detector.observe(Sample::new(30.0, t0 + chrono::Duration::seconds(2)));
        assert_eq!(
            detector.phase(),
            Phase::Candidate {
                low_distance_cm: 30.0,
                stable_count: 0
            }
        );
    }
}
