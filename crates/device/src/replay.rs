//! Offline replay of recorded distance readings.
//!
//! Runs a recording through a fresh detector with synthetic timestamps one
//! poll interval apart. No sensor, camera or network is touched, so the
//! same recording always yields the same events.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};

use binbin_core::{BinEvent, DeviceConfig};
use binbin_detector::{replay, Sample};

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("failed to read samples: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: not a distance: {text:?}")]
    InvalidLine { line: usize, text: String },

    #[error("sample {index} is out of the representable time range with a {interval:?} poll interval")]
    TimestampOverflow { index: usize, interval: Duration },
}

/// Parse one distance per line. Blank lines and `#` comments are skipped.
pub fn parse_samples(text: &str) -> Result<Vec<f64>, ReplayError> {
    let mut out = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let value = line
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ReplayError::InvalidLine {
                line: idx + 1,
                text: line.to_string(),
            })?;
        out.push(value);
    }
    Ok(out)
}

pub fn read_samples(path: impl AsRef<Path>) -> Result<Vec<f64>, ReplayError> {
    let text = std::fs::read_to_string(path)?;
    parse_samples(&text)
}

/// Timestamp of the `index`-th sample: `start + index * interval`.
fn sample_time(
    start: DateTime<Utc>,
    interval: Duration,
    index: usize,
) -> Result<DateTime<Utc>, ReplayError> {
    let overflow = || ReplayError::TimestampOverflow { index, interval };
    let step = chrono::Duration::from_std(interval).map_err(|_| overflow())?;
    let factor = i32::try_from(index).map_err(|_| overflow())?;
    let offset = step.checked_mul(factor).ok_or_else(overflow)?;
    start.checked_add_signed(offset).ok_or_else(overflow)
}

/// Events the device would have emitted for `distances`, starting at `start`.
/// Deposit events carry no image.
pub fn replay_events(
    config: &DeviceConfig,
    distances: &[f64],
    start: DateTime<Utc>,
) -> Result<Vec<BinEvent>, ReplayError> {
    let samples = distances
        .iter()
        .enumerate()
        .map(|(i, d)| Ok(Sample::new(*d, sample_time(start, config.poll_interval, i)?)))
        .collect::<Result<Vec<_>, ReplayError>>()?;

    Ok(replay(&config.detector(), samples)
        .into_iter()
        .map(|detection| detection.into_event(&config.bin_id))
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use binbin_core::EventKind;

    use super::*;

    #[test]
    fn parse_skips_comments_and_blanks() {
        let text = "# recorded 2026-04-02\n40\n\n  39.5 # lid open\n30\n";
        assert_eq!(parse_samples(text).unwrap(), vec![40.0, 39.5, 30.0]);
    }

    #[test]
    fn parse_reports_bad_line() {
        match parse_samples("40\nfoo\n") {
            Err(ReplayError::InvalidLine { line, text }) => {
                assert_eq!(line, 2);
                assert_eq!(text, "foo");
            }
            other => panic!("expected InvalidLine, got: {other:?}"),
        }
    }

    fn config(yaml: &str) -> DeviceConfig {
        DeviceConfig::from_yaml_with_overrides(yaml, |_| None).unwrap()
    }

    #[test]
    fn replay_spaces_samples_by_poll_interval() {
        let config = config("bin_id: 9\nfull_threshold_cm: 15\n");
        let start = Utc.with_ymd_and_hms(2026, 4, 2, 9, 0, 0).unwrap();
        let events = replay_events(&config, &[40.0, 30.0, 29.0, 29.2], start).unwrap();

        let deposit = events
            .iter()
            .find(|e| e.event_type == EventKind::Deposit)
            .unwrap();
        assert_eq!(deposit.timestamp, start + chrono::Duration::seconds(6));
        assert!(!deposit.has_image());
        assert!(events.iter().all(|e| e.bin_id == config.bin_id));
    }

    #[test]
    fn huge_poll_interval_is_an_error_not_a_panic() {
        let config = config(
            "bin_id: 9\nfull_threshold_cm: 15\ndistance_poll_seconds: \"300000000d\"\n",
        );
        let start = Utc.with_ymd_and_hms(2026, 4, 2, 9, 0, 0).unwrap();

        match replay_events(&config, &[40.0, 30.0], start) {
            Err(ReplayError::TimestampOverflow { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected TimestampOverflow, got: {other:?}"),
        }
    }

    #[test]
    fn timestamp_overflow_near_end_of_time() {
        let near_max = DateTime::<Utc>::MAX_UTC - chrono::Duration::seconds(3);
        assert!(sample_time(near_max, Duration::from_secs(2), 1).is_ok());
        assert!(matches!(
            sample_time(near_max, Duration::from_secs(2), 2),
            Err(ReplayError::TimestampOverflow { index: 2, .. })
        ));
    }
}
