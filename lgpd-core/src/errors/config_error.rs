//! Configuration errors.

use super::error_code::{self, ErrorCode};
use super::SourceError;

/// Errors raised while loading configuration or validating a scan request
/// against a registered source. Surfaced to the caller at submit time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    FileNotFound { path: String },

    #[error("Config parse error in {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("Config validation failed for {field}: {message}")]
    ValidationFailed { field: String, message: String },

    #[error("Unsupported database driver: {driver}")]
    UnsupportedDriver { driver: String },

    #[error("Source config {id} not found")]
    MissingSource { id: i64 },
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedDriver { .. } => error_code::UNSUPPORTED_DRIVER,
            _ => error_code::CONFIG_ERROR,
        }
    }
}

impl From<SourceError> for ConfigError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::UnsupportedDriver { driver } => ConfigError::UnsupportedDriver { driver },
            other => ConfigError::ValidationFailed {
                field: "driver".to_string(),
                message: other.to_string(),
            },
        }
    }
}
