use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::event::BinId;

/// Maximum deviation from a candidate's low point still considered stable.
pub const STABILITY_TOLERANCE_CM: f64 = 1.5;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_full_event_cooldown() -> Duration {
    Duration::from_secs(30)
}

fn default_deposit_drop_cm() -> f64 {
    6.0
}

fn default_deposit_stable_samples() -> u32 {
    2
}

fn default_deposit_cooldown() -> Duration {
    Duration::from_secs(8)
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_sensor_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_camera_command() -> String {
    "rpicam-still --nopreview --immediate --width 640 --height 480 --encoding jpg --output -".into()
}

fn default_camera_timeout() -> Duration {
    Duration::from_secs(10)
}

fn read_config(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Detector thresholds ───────────────────────────────────────

/// Thresholds and cooldowns consumed by the fill & deposit state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Distance below which the bin is considered full.
    pub full_threshold_cm: f64,
    /// Minimum time between consecutive `bin_full` emissions.
    pub full_event_cooldown: Duration,
    /// Minimum single-step decrease that may start a deposit candidate.
    pub deposit_drop_cm: f64,
    /// Consecutive stable samples required to confirm a deposit.
    pub deposit_stable_samples: u32,
    /// Minimum time between consecutive deposit emissions.
    pub deposit_cooldown: Duration,
    /// Fixed at [`STABILITY_TOLERANCE_CM`].
    pub stability_tolerance_cm: f64,
}

impl DetectorConfig {
    /// Thresholds with every optional field at its documented default.
    pub fn new(full_threshold_cm: f64) -> Self {
        Self {
            full_threshold_cm,
            full_event_cooldown: default_full_event_cooldown(),
            deposit_drop_cm: default_deposit_drop_cm(),
            deposit_stable_samples: default_deposit_stable_samples(),
            deposit_cooldown: default_deposit_cooldown(),
            stability_tolerance_cm: STABILITY_TOLERANCE_CM,
        }
    }
}

// ── Top-level config ──────────────────────────────────────────

/// Device configuration, loaded once at startup and never mutated.
///
/// Parsed from `config/device.yaml`. Key names follow the backend's device
/// config file; duration keys accept seconds or strings like `"30s"`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub bin_id: BinId,

    /// Backend root, e.g. `http://192.168.1.20:5000`. Required unless
    /// events are only logged.
    #[serde(default)]
    pub backend_base_url: Option<String>,

    pub full_threshold_cm: f64,

    #[serde(
        rename = "distance_poll_seconds",
        default = "default_poll_interval",
        with = "crate::duration"
    )]
    pub poll_interval: Duration,

    #[serde(
        rename = "post_full_event_cooldown_seconds",
        default = "default_full_event_cooldown",
        with = "crate::duration"
    )]
    pub full_event_cooldown: Duration,

    #[serde(default = "default_deposit_drop_cm")]
    pub deposit_drop_cm: f64,

    #[serde(default = "default_deposit_stable_samples")]
    pub deposit_stable_samples: u32,

    #[serde(
        rename = "deposit_cooldown_seconds",
        default = "default_deposit_cooldown",
        with = "crate::duration"
    )]
    pub deposit_cooldown: Duration,

    /// Upper bound on one event dispatch.
    #[serde(
        rename = "http_timeout_seconds",
        default = "default_http_timeout",
        with = "crate::duration"
    )]
    pub http_timeout: Duration,

    #[serde(default)]
    pub sensor: SensorConfig,

    #[serde(default)]
    pub camera: CameraConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    /// Shell command printing one distance in centimeters to stdout.
    #[serde(default)]
    pub command: Option<String>,

    #[serde(
        rename = "timeout_seconds",
        default = "default_sensor_timeout",
        with = "crate::duration"
    )]
    pub timeout: Duration,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout: default_sensor_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// Shell command writing one JPEG to stdout.
    #[serde(default = "default_camera_command")]
    pub command: String,

    #[serde(
        rename = "timeout_seconds",
        default = "default_camera_timeout",
        with = "crate::duration"
    )]
    pub timeout: Duration,

    /// When set, every captured image is also kept here.
    #[serde(default)]
    pub capture_dir: Option<PathBuf>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            command: default_camera_command(),
            timeout: default_camera_timeout(),
            capture_dir: None,
        }
    }
}

impl DeviceConfig {
    /// Parse config from a YAML string, apply `BINBIN_*` env overrides and validate.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Self::from_yaml_with_overrides(yaml, |key| std::env::var(key).ok())
    }

    /// Like [`from_yaml`](Self::from_yaml), but `BINBIN_*` overrides come
    /// from `lookup` instead of the process environment.
    pub fn from_yaml_with_overrides(
        yaml: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(yaml)?;
        config.apply_overrides(lookup);
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_yaml(&read_config(path.as_ref())?)
    }

    /// The detector's slice of this config.
    pub fn detector(&self) -> DetectorConfig {
        DetectorConfig {
            full_threshold_cm: self.full_threshold_cm,
            full_event_cooldown: self.full_event_cooldown,
            deposit_drop_cm: self.deposit_drop_cm,
            deposit_stable_samples: self.deposit_stable_samples,
            deposit_cooldown: self.deposit_cooldown,
            stability_tolerance_cm: STABILITY_TOLERANCE_CM,
        }
    }

    /// Backend root URL, or a [`ConfigError`] when events must be delivered
    /// but none is configured.
    pub fn require_backend_base_url(&self) -> Result<&str, ConfigError> {
        self.backend_base_url
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid("backend_base_url is required".into()))
    }

    pub fn require_sensor_command(&self) -> Result<&str, ConfigError> {
        self.sensor
            .command
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ConfigError::Invalid("sensor.command is required".into()))
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (bin {}):", self.bin_id);
        tracing::info!(
            "  backend:  {}",
            self.backend_base_url.as_deref().unwrap_or("(none)")
        );
        tracing::info!(
            "  full:     threshold={}cm cooldown={:?}",
            self.full_threshold_cm,
            self.full_event_cooldown
        );
        tracing::info!(
            "  deposit:  drop={}cm stable_samples={} cooldown={:?}",
            self.deposit_drop_cm,
            self.deposit_stable_samples,
            self.deposit_cooldown
        );
        tracing::info!("  poll:     every {:?}", self.poll_interval);
        tracing::info!(
            "  camera:   capture_dir={}",
            self.camera
                .capture_dir
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".into())
        );
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply environment variable overrides, reading each key via `lookup`.
    ///
    /// Convention: `BINBIN_KEY` overrides `key`.
    /// - `BINBIN_BIN_ID` -> `bin_id`
    /// - `BINBIN_BACKEND_BASE_URL` -> `backend_base_url`
    /// - `BINBIN_FULL_THRESHOLD_CM` -> `full_threshold_cm`
    /// - `BINBIN_DISTANCE_POLL_SECONDS` -> `distance_poll_seconds`
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("BINBIN_BIN_ID").filter(|v| !v.trim().is_empty()) {
            if let Ok(id) = v.parse::<BinId>() {
                self.bin_id = id;
            }
        }
        if let Some(v) = lookup("BINBIN_BACKEND_BASE_URL").filter(|v| !v.is_empty()) {
            self.backend_base_url = Some(v);
        }
        if let Some(v) = lookup("BINBIN_FULL_THRESHOLD_CM") {
            match v.trim().parse::<f64>() {
                Ok(cm) => self.full_threshold_cm = cm,
                Err(_) => tracing::warn!(value = %v, "ignoring unparseable BINBIN_FULL_THRESHOLD_CM"),
            }
        }
        if let Some(v) = lookup("BINBIN_DISTANCE_POLL_SECONDS") {
            match crate::duration::parse_duration(&v) {
                Some(d) => self.poll_interval = d,
                None => tracing::warn!(value = %v, "ignoring unparseable BINBIN_DISTANCE_POLL_SECONDS"),
            }
        }
    }

    fn normalize(&mut self) {
        if let Some(url) = self.backend_base_url.as_mut() {
            let trimmed = url.trim().trim_end_matches('/').to_string();
            *url = trimmed;
        }
        if self.backend_base_url.as_deref() == Some("") {
            self.backend_base_url = None;
        }
    }

    // ── Validation ──────────────────────────────────────────────────

    /// Reject values the detector cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.full_threshold_cm.is_finite() || self.full_threshold_cm <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "full_threshold_cm must be a positive number, got {}",
                self.full_threshold_cm
            )));
        }
        if !self.deposit_drop_cm.is_finite() || self.deposit_drop_cm <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "deposit_drop_cm must be a positive number, got {}",
                self.deposit_drop_cm
            )));
        }
        if self.deposit_stable_samples == 0 {
            return Err(ConfigError::Invalid(
                "deposit_stable_samples must be at least 1".into(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "distance_poll_seconds must be greater than zero".into(),
            ));
        }
        if let Some(url) = &self.backend_base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "backend_base_url must be an http(s) URL, got '{url}'"
                )));
            }
        }
        Ok(())
    }
}
