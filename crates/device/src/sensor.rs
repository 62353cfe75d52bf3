//! Distance sensor backed by an external command.
//!
//! The ultrasonic driver lives outside this process (GPIO access, echo
//! timing). Each read runs the configured command, which prints a single
//! distance in centimeters to stdout.

use std::time::Duration;

use binbin_core::{ConfigError, DeviceConfig};

use crate::command::run_captured;
use crate::traits::{AcquisitionError, Device, DistanceSensor};

pub struct CommandSensor {
    command: String,
    timeout: Duration,
}

impl CommandSensor {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.require_sensor_command()?,
            config.sensor.timeout,
        ))
    }
}

#[async_trait::async_trait]
impl DistanceSensor for CommandSensor {
    async fn read_distance(&mut self) -> Result<f64, AcquisitionError> {
        let stdout = run_captured(Device::Sensor, &self.command, self.timeout).await?;
        parse_distance(&stdout)
    }

    fn name(&self) -> &str {
        "command"
    }
}

/// Parse driver output: one non-negative finite number, surrounding
/// whitespace allowed.
fn parse_distance(stdout: &[u8]) -> Result<f64, AcquisitionError> {
    let text = String::from_utf8_lossy(stdout);
    let text = text.trim();
    let value: f64 = text
        .parse()
        .map_err(|_| Device::Sensor.failure(format!("unparseable reading: {text:?}")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(Device::Sensor.failure(format!("out-of-range reading: {value}")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_and_padded() {
        assert_eq!(parse_distance(b"27.31").unwrap(), 27.31);
        assert_eq!(parse_distance(b"  40\n").unwrap(), 40.0);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_distance(b"").is_err());
        assert!(parse_distance(b"distance=12").is_err());
        assert!(parse_distance(b"NaN").is_err());
        assert!(parse_distance(b"-3").is_err());
    }

    #[tokio::test]
    async fn reads_from_command() {
        let mut sensor = CommandSensor::new("echo 33.5", Duration::from_secs(5));
        assert_eq!(sensor.read_distance().await.unwrap(), 33.5);
    }

    #[tokio::test]
    async fn failing_command_is_acquisition_error() {
        let mut sensor = CommandSensor::new("exit 1", Duration::from_secs(5));
        assert!(matches!(
            sensor.read_distance().await,
            Err(AcquisitionError::Sensor(_))
        ));
    }
}
