use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating the device configuration.
///
/// Always fatal: the device must not start with an incomplete configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
