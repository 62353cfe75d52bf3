//! Camera backed by an external capture command.
//!
//! The command writes one JPEG to stdout (`rpicam-still ... --output -` on a
//! Raspberry Pi). Captures can optionally be kept on disk as
//! `binbin_YYYYmmdd_HHMMSS.jpg`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use binbin_core::{DeviceConfig, JpegImage};

use crate::command::run_captured;
use crate::traits::{AcquisitionError, Camera, Device};

pub struct CommandCamera {
    command: String,
    timeout: Duration,
    capture_dir: Option<PathBuf>,
}

impl CommandCamera {
    pub fn new(command: impl Into<String>, timeout: Duration, capture_dir: Option<PathBuf>) -> Self {
        Self {
            command: command.into(),
            timeout,
            capture_dir,
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(
            config.camera.command.clone(),
            config.camera.timeout,
            config.camera.capture_dir.clone(),
        )
    }

    /// Keep a copy of the capture. Failure only costs the local copy.
    async fn save(&self, dir: &Path, image: &JpegImage) {
        let file_name = capture_file_name(chrono::Local::now());
        let path = dir.join(file_name);

        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!(dir = %dir.display(), error = %e, "cannot create capture dir");
            return;
        }
        match tokio::fs::write(&path, image.as_bytes()).await {
            Ok(()) => debug!(path = %path.display(), bytes = image.as_bytes().len(), "capture saved"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to save capture"),
        }
    }
}

#[async_trait::async_trait]
impl Camera for CommandCamera {
    async fn capture_image(&mut self) -> Result<JpegImage, AcquisitionError> {
        let stdout = run_captured(Device::Camera, &self.command, self.timeout).await?;
        let len = stdout.len();
        let image = JpegImage::parse(stdout)
            .ok_or_else(|| Device::Camera.failure(format!("output is not a JPEG ({len} bytes)")))?;

        if let Some(dir) = &self.capture_dir {
            self.save(dir, &image).await;
        }
        Ok(image)
    }

    fn name(&self) -> &str {
        "command"
    }
}

fn capture_file_name(at: chrono::DateTime<chrono::Local>) -> String {
    format!("binbin_{}.jpg", at.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn file_name_format() {
        let at = chrono::Local.with_ymd_and_hms(2026, 1, 9, 7, 5, 3).unwrap();
        assert_eq!(capture_file_name(at), "binbin_20260109_070503.jpg");
    }

    #[tokio::test]
    async fn captures_and_keeps_copy() {
        let dir = tempfile::tempdir().unwrap();
        let frame = dir.path().join("frame.jpg");
        std::fs::write(&frame, [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]).unwrap();
        let captures = dir.path().join("captures");

        let mut camera = CommandCamera::new(
            format!("cat '{}'", frame.display()),
            Duration::from_secs(5),
            Some(captures.clone()),
        );
        let image = camera.capture_image().await.unwrap();
        assert_eq!(image.as_bytes().len(), 6);

        let saved: Vec<_> = std::fs::read_dir(&captures).unwrap().collect();
        assert_eq!(saved.len(), 1);
    }

    #[tokio::test]
    async fn rejects_non_jpeg_output() {
        let mut camera = CommandCamera::new("printf hello", Duration::from_secs(5), None);
        match camera.capture_image().await {
            Err(AcquisitionError::Camera(msg)) => assert!(msg.contains("not a JPEG")),
            other => panic!("expected Camera error, got: {other:?}"),
        }
    }
}
