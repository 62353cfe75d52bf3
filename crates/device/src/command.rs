//! Shell command execution for command-backed hardware drivers.
//!
//! Runs commands via `/bin/sh -c` with a timeout and returns stdout.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::traits::{AcquisitionError, Device};

/// Run `command` and return its stdout. A non-zero exit, spawn failure or
/// timeout is an [`AcquisitionError`] attributed to `device`. The child is
/// killed if the timeout fires.
pub(crate) async fn run_captured(
    device: Device,
    command: &str,
    timeout: Duration,
) -> Result<Vec<u8>, AcquisitionError> {
    debug!(%device, command, ?timeout, "running driver command");

    let child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|error| AcquisitionError::Spawn { device, error })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(error)) => return Err(AcquisitionError::Spawn { device, error }),
        Err(_) => {
            warn!(%device, command, ?timeout, "driver command timed out");
            return Err(AcquisitionError::Timeout {
                device,
                after: timeout,
            });
        }
    };

    if !output.status.success() {
        let exit_code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(device.failure(format!(
            "command exited with code {exit_code}: {}",
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}
