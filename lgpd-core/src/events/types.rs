//! Event payload types.

use crate::models::{JobId, PiiCategory};

/// Payload for `on_job_submitted`.
#[derive(Debug, Clone)]
pub struct JobSubmittedEvent {
    pub job_id: JobId,
    pub source_config_id: i64,
}

/// Payload for `on_job_started`.
#[derive(Debug, Clone)]
pub struct JobStartedEvent {
    pub job_id: JobId,
    pub source: String,
}

/// Payload for `on_job_progress`.
#[derive(Debug, Clone)]
pub struct JobProgressEvent {
    pub job_id: JobId,
    pub progress: u8,
    pub rows_scanned: u64,
}

/// Payload for `on_job_completed`.
#[derive(Debug, Clone)]
pub struct JobCompletedEvent {
    pub job_id: JobId,
    pub report_ref: String,
    pub totals: Vec<(PiiCategory, u64)>,
    pub duration_ms: u64,
}

/// Payload for `on_job_failed`.
#[derive(Debug, Clone)]
pub struct JobFailedEvent {
    pub job_id: JobId,
    pub reason: String,
    /// True when findings were computed before the failure (report write).
    pub findings_retained: bool,
}
