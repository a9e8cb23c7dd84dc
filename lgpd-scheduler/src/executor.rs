//! Drives one job from dispatch to its terminal state.
//!
//! The executor owns the only copy of the job's state in memory: the state
//! it last committed. That value is the `expected` side of every CAS it
//! issues, so a concurrent writer always surfaces as `StaleState`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use lgpd_core::config::ComplianceRequirements;
use lgpd_core::errors::StorageError;
use lgpd_core::events::{
    EventDispatcher, JobCompletedEvent, JobFailedEvent, JobProgressEvent, JobStartedEvent,
};
use lgpd_core::models::scan_job::REASON_CANCELLED;
use lgpd_core::models::{
    totals_by_category, Finding, JobId, JobState, ScanJob, TransitionPayload,
};
use lgpd_core::traits::{
    CancelReason, CancellationToken, IJobStore, ISourceRegistry, ReportWriter, ScopedHandle,
};
use lgpd_detect::DetectionEngine;
use lgpd_sources::ReaderRegistry;

use crate::progress::ProgressTracker;

/// Collaborators shared by the service front end and every worker.
pub(crate) struct JobContext {
    pub store: Arc<dyn IJobStore>,
    pub sources: Arc<dyn ISourceRegistry>,
    pub readers: ReaderRegistry,
    pub engine: Arc<DetectionEngine>,
    pub writer: Arc<dyn ReportWriter>,
    pub requirements: ComplianceRequirements,
    pub events: EventDispatcher,
    /// Tokens of jobs currently owned by an executor.
    pub tokens: DashMap<JobId, CancellationToken>,
    pub job_timeout: Duration,
    pub progress_batch_rows: u64,
    pub shutting_down: AtomicBool,
}

impl JobContext {
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn emit_failed(&self, job_id: JobId, reason: &str, findings_retained: bool) {
        self.events.emit_job_failed(&JobFailedEvent {
            job_id,
            reason: reason.to_string(),
            findings_retained,
        });
    }
}

/// Keeps a job's token visible to `cancel` while its executor runs.
struct TokenRegistration<'a> {
    tokens: &'a DashMap<JobId, CancellationToken>,
    job_id: JobId,
}

impl<'a> TokenRegistration<'a> {
    fn new(tokens: &'a DashMap<JobId, CancellationToken>, job_id: JobId, token: CancellationToken) -> Self {
        tokens.insert(job_id, token);
        Self { tokens, job_id }
    }
}

impl Drop for TokenRegistration<'_> {
    fn drop(&mut self) {
        self.tokens.remove(&self.job_id);
    }
}

/// Run a dequeued job. Never panics on job-level failures; every failure
/// is recorded on the job.
pub(crate) fn run_job(ctx: &JobContext, job_id: JobId) {
    let token = CancellationToken::new();
    let _registration = TokenRegistration::new(&ctx.tokens, job_id, token.clone());

    let mut execution = Execution::new(ctx, job_id);
    let next = if ctx.is_shutting_down() {
        JobState::failed(REASON_CANCELLED)
    } else {
        JobState::InProgress { progress: 0 }
    };

    let job = match execution.commit(next, TransitionPayload::none()) {
        Ok(job) if job.is_terminal() => {
            tracing::info!(job_id = %job_id, "queued job cancelled by shutdown");
            ctx.emit_failed(job_id, REASON_CANCELLED, false);
            return;
        }
        Ok(job) => job,
        Err(StorageError::StaleState { actual, .. }) => {
            // Cancelled (or rejected) between enqueue and dispatch.
            tracing::debug!(job_id = %job_id, state = %actual, "job left pending before dispatch, skipping");
            return;
        }
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "failed to dispatch job");
            return;
        }
    };

    execution.started = Instant::now();
    execution.scan(&token, job.source_config_id);
}

struct Execution<'a> {
    ctx: &'a JobContext,
    job_id: JobId,
    committed: JobState,
    started: Instant,
}

impl<'a> Execution<'a> {
    fn new(ctx: &'a JobContext, job_id: JobId) -> Self {
        Self {
            ctx,
            job_id,
            committed: JobState::Pending,
            started: Instant::now(),
        }
    }

    fn commit(&mut self, next: JobState, payload: TransitionPayload) -> Result<ScanJob, StorageError> {
        let job = self
            .ctx
            .store
            .transition(self.job_id, &self.committed, next, payload)?;
        self.committed = job.state.clone();
        Ok(job)
    }

    /// Log a transition the store refused. The executor stops touching the
    /// job afterwards.
    fn abandon(&self, err: StorageError) {
        match err {
            StorageError::StaleState { .. } => {
                tracing::error!(
                    job_id = %self.job_id,
                    expected = %self.committed,
                    error = %err,
                    "job state changed under its executor, abandoning update"
                );
            }
            other => {
                tracing::error!(job_id = %self.job_id, error = %other, "failed to persist job transition");
            }
        }
    }

    fn fail(&mut self, reason: String, findings: Option<Vec<Finding>>) {
        let retained = findings.is_some();
        let payload = TransitionPayload {
            findings,
            report_ref: None,
        };
        match self.commit(JobState::failed(reason.clone()), payload) {
            Ok(job) => {
                tracing::warn!(
                    job_id = %self.job_id,
                    reason = %reason,
                    progress = job.progress_percent,
                    "scan job failed"
                );
                self.ctx.emit_failed(self.job_id, &reason, retained);
            }
            Err(e) => self.abandon(e),
        }
    }

    fn close(&self, handle: ScopedHandle) {
        if let Err(e) = handle.close() {
            tracing::warn!(job_id = %self.job_id, error = %e, "failed to close source handle");
        }
    }

    fn scan(&mut self, token: &CancellationToken, source_config_id: i64) {
        let ctx = self.ctx;
        let config = match ctx.sources.get_source(source_config_id) {
            Ok(config) => config,
            Err(e) => return self.fail(format!("source config unavailable: {e}"), None),
        };
        let source = config.target();
        tracing::info!(job_id = %self.job_id, source = %source, "scan job started");
        ctx.events.emit_job_started(&JobStartedEvent {
            job_id: self.job_id,
            source: source.clone(),
        });

        let reader = match ctx.readers.resolve(&config) {
            Ok(reader) => reader,
            Err(e) => return self.fail(e.to_string(), None),
        };
        let mut handle = match reader.open(&config) {
            Ok(handle) => ScopedHandle::new(handle),
            Err(e) => return self.fail(e.to_string(), None),
        };

        let deadline = self.started.checked_add(ctx.job_timeout);
        let mut tracker = ProgressTracker::new(handle.size_hint(), ctx.progress_batch_rows);
        let mut accumulator = ctx.engine.accumulator();

        loop {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                token.cancel_with(CancelReason::Timeout);
            }
            if let Some(reason) = token.reason() {
                self.close(handle);
                return self.fail(reason.as_reason().to_string(), None);
            }

            let row = match handle.next_row() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => {
                    self.close(handle);
                    return self.fail(e.to_string(), None);
                }
            };
            if let Err(e) = accumulator.feed(&row) {
                self.close(handle);
                return self.fail(e.to_string(), None);
            }

            if let Some(percent) = tracker.record_row() {
                let next = JobState::InProgress { progress: percent };
                if let Err(e) = self.commit(next, TransitionPayload::none()) {
                    return self.abandon(e);
                }
                tracker.mark_committed(percent);
                tracing::debug!(
                    job_id = %self.job_id,
                    progress = percent,
                    rows = tracker.rows_scanned(),
                    "progress committed"
                );
                ctx.events.emit_job_progress(&JobProgressEvent {
                    job_id: self.job_id,
                    progress: percent,
                    rows_scanned: tracker.rows_scanned(),
                });
            }
        }

        self.close(handle);
        let bytes = accumulator.bytes_scanned();
        let findings = accumulator.finish();
        tracing::debug!(
            job_id = %self.job_id,
            rows = tracker.rows_scanned(),
            bytes,
            findings = findings.len(),
            "source exhausted"
        );

        let done = JobState::InProgress { progress: 100 };
        if self.committed != done {
            if let Err(e) = self.commit(done, TransitionPayload::none()) {
                return self.abandon(e);
            }
            ctx.events.emit_job_progress(&JobProgressEvent {
                job_id: self.job_id,
                progress: 100,
                rows_scanned: tracker.rows_scanned(),
            });
        }
        self.publish(findings);
    }

    /// Write the report, then complete the job with findings and report
    /// reference in one transition.
    fn publish(&mut self, findings: Vec<Finding>) {
        let ctx = self.ctx;
        let report_ref = match ctx.writer.write(&findings, &ctx.requirements) {
            Ok(report_ref) => report_ref,
            Err(e) => return self.fail(format!("report write failed: {e}"), Some(findings)),
        };

        let totals: Vec<_> = totals_by_category(&findings).into_iter().collect();
        let payload = TransitionPayload::with_findings(findings).report(report_ref.clone());
        if let Err(e) = self.commit(JobState::Completed, payload) {
            return self.abandon(e);
        }

        let duration_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            job_id = %self.job_id,
            report = %report_ref,
            duration_ms,
            "scan job completed"
        );
        ctx.events.emit_job_completed(&JobCompletedEvent {
            job_id: self.job_id,
            report_ref,
            totals,
            duration_ms,
        });
    }
}

/// Move a job whose executor panicked to `Failed`, whatever state it was
/// left in.
pub(crate) fn fail_abandoned(ctx: &JobContext, job_id: JobId, reason: &str) {
    for _ in 0..3 {
        let job = match ctx.store.get_job(job_id) {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "cannot read job after executor panic");
                return;
            }
        };
        if job.is_terminal() {
            return;
        }
        match ctx.store.transition(
            job_id,
            &job.state,
            JobState::failed(reason),
            TransitionPayload::none(),
        ) {
            Ok(_) => {
                ctx.emit_failed(job_id, reason, false);
                return;
            }
            Err(StorageError::StaleState { .. }) => continue,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "cannot fail job after executor panic");
                return;
            }
        }
    }
}
