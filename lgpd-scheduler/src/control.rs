//! Job operations that need no worker pool.
//!
//! [`JobControl`] serves processes that only inspect or cancel jobs, such as
//! a CLI invocation running beside the process that owns the workers.
//! [`ScanService`](crate::ScanService) reuses the same helpers, adding a
//! token signal for jobs its own executors hold.

use std::io::Read;
use std::sync::Arc;

use lgpd_core::errors::{SchedulerError, StorageError};
use lgpd_core::models::scan_job::REASON_CANCELLED;
use lgpd_core::models::{JobId, JobState, ScanJob, TransitionPayload};
use lgpd_core::traits::{IJobStore, ReportWriter};

/// Re-reads allowed when a cancel races an executor's own transitions.
const MAX_CANCEL_ATTEMPTS: usize = 8;

pub(crate) enum CancelOutcome {
    /// Already terminal.
    Unchanged(ScanJob),
    /// An in-process executor owns the job and was told to stop.
    Signalled(ScanJob),
    /// Moved to `Failed("cancelled")` here.
    Cancelled { from: JobState, job: ScanJob },
}

/// Cancel `job_id`. `signal_owner` is offered the job first; when it
/// returns false the job is failed directly through the store's CAS.
pub(crate) fn cancel_job(
    store: &dyn IJobStore,
    job_id: JobId,
    signal_owner: impl Fn(JobId) -> bool,
) -> Result<CancelOutcome, StorageError> {
    let mut attempts = 0;
    loop {
        let job = store.get_job(job_id)?;
        if job.is_terminal() {
            return Ok(CancelOutcome::Unchanged(job));
        }
        if signal_owner(job_id) {
            return Ok(CancelOutcome::Signalled(job));
        }

        match store.transition(
            job_id,
            &job.state,
            JobState::failed(REASON_CANCELLED),
            TransitionPayload::none(),
        ) {
            Ok(cancelled) => {
                return Ok(CancelOutcome::Cancelled {
                    from: job.state,
                    job: cancelled,
                })
            }
            Err(StorageError::StaleState { .. }) if attempts < MAX_CANCEL_ATTEMPTS => {
                attempts += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

pub(crate) fn open_report(
    store: &dyn IJobStore,
    writer: &dyn ReportWriter,
    job_id: JobId,
) -> Result<Box<dyn Read + Send>, SchedulerError> {
    let job = store.get_job(job_id)?;
    match job.report_ref.as_deref() {
        Some(report_ref) => Ok(writer.open(report_ref)?),
        None => Err(SchedulerError::ReportNotFound { job_id: job_id.0 }),
    }
}

/// Cancellation and report access over the job store alone.
///
/// A job running in another process is failed in the store; its executor
/// finds the change at its next progress commit and stops.
pub struct JobControl {
    store: Arc<dyn IJobStore>,
    writer: Arc<dyn ReportWriter>,
}

impl JobControl {
    pub fn new(store: Arc<dyn IJobStore>, writer: Arc<dyn ReportWriter>) -> Self {
        Self { store, writer }
    }

    pub fn cancel(&self, job_id: JobId) -> Result<ScanJob, SchedulerError> {
        match cancel_job(self.store.as_ref(), job_id, |_| false)? {
            CancelOutcome::Unchanged(job) | CancelOutcome::Signalled(job) => Ok(job),
            CancelOutcome::Cancelled { from, job } => {
                tracing::info!(job_id = %job_id, from = %from, "scan job cancelled");
                Ok(job)
            }
        }
    }

    pub fn fetch_report(&self, job_id: JobId) -> Result<Box<dyn Read + Send>, SchedulerError> {
        open_report(self.store.as_ref(), self.writer.as_ref(), job_id)
    }
}
