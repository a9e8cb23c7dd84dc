//! Source reader errors.

use super::error_code::{self, ErrorCode};

/// Errors produced while opening or reading an external data source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Unsupported database driver: {driver}")]
    UnsupportedDriver { driver: String },

    #[error("connection to {target} failed: {message}")]
    Connection { target: String, message: String },

    #[error("read from {location} failed: {message}")]
    Read { location: String, message: String },
}

impl ErrorCode for SourceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedDriver { .. } => error_code::UNSUPPORTED_DRIVER,
            Self::Connection { .. } => error_code::CONNECTION_ERROR,
            Self::Read { .. } => error_code::SOURCE_ERROR,
        }
    }
}
