//! Storage-layer errors for SQLite operations.

use super::error_code::{self, ErrorCode};

/// Errors raised by the job store and source-config registry.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    SqliteError { message: String },

    #[error("migration failed at version {version}: {message}")]
    MigrationFailed { version: u32, message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("stale state for job {job_id}: expected {expected}, found {actual}")]
    StaleState {
        job_id: i64,
        expected: String,
        actual: String,
    },

    #[error("invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition { job_id: i64, from: String, to: String },

    #[error("source config name '{name}' already exists")]
    DuplicateName { name: String },

    #[error("source config {id} is referenced by {job_count} job(s)")]
    ConfigInUse { id: i64, job_count: i64 },

    #[error("serialization error: {message}")]
    Serialization { message: String },
}

impl ErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MigrationFailed { .. } => error_code::MIGRATION_FAILED,
            Self::NotFound { .. } => error_code::NOT_FOUND,
            Self::StaleState { .. } => error_code::STALE_STATE,
            Self::InvalidTransition { .. } => error_code::INVALID_TRANSITION,
            Self::DuplicateName { .. } | Self::ConfigInUse { .. } => error_code::CONFLICT,
            _ => error_code::STORAGE_ERROR,
        }
    }
}
