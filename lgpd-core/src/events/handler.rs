//! JobEventHandler trait, all methods with no-op defaults.

use super::types::*;

/// Receives job lifecycle events after the corresponding transition has
/// been committed to the job store.
///
/// Handlers only override the events they care about. Handlers run on
/// worker threads and must be `Send + Sync`.
pub trait JobEventHandler: Send + Sync {
    fn on_job_submitted(&self, _event: &JobSubmittedEvent) {}
    fn on_job_started(&self, _event: &JobStartedEvent) {}
    fn on_job_progress(&self, _event: &JobProgressEvent) {}
    fn on_job_completed(&self, _event: &JobCompletedEvent) {}
    fn on_job_failed(&self, _event: &JobFailedEvent) {}
}
