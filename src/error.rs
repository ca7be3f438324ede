use std::path::PathBuf;

use thiserror::Error;

use crate::airtable::StoreError;
use crate::shipit::TrackingError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON config error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors that abort a run. The watermark is left untouched when one occurs.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("data store error: {0}")]
    Store(#[from] StoreError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("tracking client setup failed: {0}")]
    TrackingSetup(#[from] TrackingError),
}
