//! Scheduler errors. Aggregates subsystem errors via `From` conversions.

use super::error_code::{self, ErrorCode};
use super::{ConfigError, DetectionError, SourceError, StorageError, WriteError};

/// Errors surfaced by the scheduler and the job query API.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Detection error: {0}")]
    Detection(#[from] DetectionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Report error: {0}")]
    Report(#[from] WriteError),

    #[error("Report for job {job_id} not found")]
    ReportNotFound { job_id: i64 },

    #[error("Scheduler is shutting down")]
    ShuttingDown,

    #[error("Failed to spawn worker thread: {message}")]
    WorkerSpawn { message: String },
}

impl ErrorCode for SchedulerError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(e) => e.error_code(),
            Self::Source(e) => e.error_code(),
            Self::Detection(e) => e.error_code(),
            Self::Storage(e) => e.error_code(),
            Self::Report(e) => e.error_code(),
            Self::ReportNotFound { .. } => error_code::NOT_FOUND,
            Self::ShuttingDown => error_code::SHUTTING_DOWN,
            Self::WorkerSpawn { .. } => error_code::WORKER_ERROR,
        }
    }
}
