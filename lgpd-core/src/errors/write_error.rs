//! Report writer errors.

use std::path::PathBuf;

use super::error_code::{self, ErrorCode};

/// Errors raised while persisting or reopening a report artifact.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("IO error writing report {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("report serialization failed: {message}")]
    Serialization { message: String },

    #[error("report artifact not found: {artifact}")]
    ArtifactMissing { artifact: String },
}

impl ErrorCode for WriteError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ArtifactMissing { .. } => error_code::NOT_FOUND,
            _ => error_code::WRITE_ERROR,
        }
    }
}
