//! Detection errors.

use super::error_code::{self, ErrorCode};
use super::SourceError;

/// Errors raised by the pattern library or detection engine.
///
/// Library errors happen at load time and are fatal to startup.
/// Input errors are fatal to the job being scanned only.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Pattern '{id}' failed to compile: {message}")]
    CompilationFailed { id: String, message: String },

    #[error("Pattern '{id}' failed self-test: {message}")]
    SelfTestFailed { id: String, message: String },

    #[error("Malformed input at {location}: {message}")]
    MalformedInput { location: String, message: String },

    /// The row stream failed underneath the engine.
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl ErrorCode for DetectionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Source(e) => e.error_code(),
            _ => error_code::DETECTION_ERROR,
        }
    }
}
