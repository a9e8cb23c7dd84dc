//! ScanService: submission, job queries, cancellation, and shutdown.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, TrySendError};
use dashmap::DashMap;
use lgpd_core::config::{ComplianceRequirements, SchedulerConfig};
use lgpd_core::errors::{ConfigError, SchedulerError, StorageError};
use lgpd_core::events::{EventDispatcher, JobEventHandler, JobSubmittedEvent};
use lgpd_core::models::scan_job::{REASON_CANCELLED, REASON_REJECTED};
use lgpd_core::models::{JobId, JobState, ScanJob, TransitionPayload};
use lgpd_core::traits::{CancelReason, IJobStore, ISourceRegistry, ReportWriter};
use lgpd_detect::DetectionEngine;
use lgpd_sources::ReaderRegistry;

use crate::control::{cancel_job, open_report, CancelOutcome};
use crate::executor::JobContext;
use crate::worker;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Configures and starts a [`ScanService`].
pub struct ScanServiceBuilder {
    store: Arc<dyn IJobStore>,
    sources: Arc<dyn ISourceRegistry>,
    writer: Arc<dyn ReportWriter>,
    readers: ReaderRegistry,
    engine: Option<Arc<DetectionEngine>>,
    requirements: ComplianceRequirements,
    events: EventDispatcher,
    config: SchedulerConfig,
    job_timeout: Option<Duration>,
}

impl ScanServiceBuilder {
    /// Replace the default SQLite/PostgreSQL/MySQL readers.
    pub fn readers(mut self, readers: ReaderRegistry) -> Self {
        self.readers = readers;
        self
    }

    /// Use a preconfigured engine instead of the built-in detectors.
    pub fn engine(mut self, engine: Arc<DetectionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn requirements(mut self, requirements: ComplianceRequirements) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn event_handler(mut self, handler: Arc<dyn JobEventHandler>) -> Self {
        self.events.register(handler);
        self
    }

    pub fn config(mut self, config: &SchedulerConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Override the per-job wall-clock budget with sub-second precision.
    pub fn job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = Some(timeout);
        self
    }

    /// Report orphaned jobs, then spawn the worker pool.
    pub fn start(self) -> Result<ScanService, SchedulerError> {
        let engine = match self.engine {
            Some(engine) => engine,
            None => Arc::new(DetectionEngine::with_builtin()?),
        };

        for job in self.store.list_orphaned()? {
            tracing::warn!(
                job_id = %job.id,
                state = %job.state,
                source_config_id = job.source_config_id,
                "orphaned job from a previous run, not retried"
            );
        }

        let workers = self.config.effective_workers().max(1);
        let capacity = self.config.effective_queue_capacity().max(1);
        let ctx = Arc::new(JobContext {
            store: self.store,
            sources: self.sources,
            readers: self.readers,
            engine,
            writer: self.writer,
            requirements: self.requirements,
            events: self.events,
            tokens: DashMap::new(),
            job_timeout: self
                .job_timeout
                .unwrap_or_else(|| self.config.effective_job_timeout()),
            progress_batch_rows: self.config.effective_progress_batch_rows(),
            shutting_down: AtomicBool::new(false),
        });

        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        let handles = worker::spawn_workers(&ctx, &receiver, workers)?;
        tracing::info!(workers, queue_capacity = capacity, "scan service started");

        Ok(ScanService {
            ctx,
            queue: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
            worker_count: workers,
        })
    }
}

/// Front end of the scheduler. Dropping the service shuts it down.
pub struct ScanService {
    ctx: Arc<JobContext>,
    queue: Mutex<Option<Sender<JobId>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScanService {
    pub fn builder(
        store: Arc<dyn IJobStore>,
        sources: Arc<dyn ISourceRegistry>,
        writer: Arc<dyn ReportWriter>,
    ) -> ScanServiceBuilder {
        ScanServiceBuilder {
            store,
            sources,
            writer,
            readers: ReaderRegistry::with_defaults(),
            engine: None,
            requirements: ComplianceRequirements::default(),
            events: EventDispatcher::new(),
            config: SchedulerConfig::default(),
            job_timeout: None,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Persist a job for `source_config_id` and enqueue it.
    ///
    /// Unknown configs and unsupported drivers fail before any job exists.
    /// When the queue is full the job is recorded as `Failed("rejected")`
    /// and its id is still returned.
    pub fn submit(&self, source_config_id: i64) -> Result<JobId, SchedulerError> {
        if self.ctx.is_shutting_down() {
            return Err(SchedulerError::ShuttingDown);
        }

        let config = match self.ctx.sources.get_source(source_config_id) {
            Ok(config) => config,
            Err(StorageError::NotFound { .. }) => {
                return Err(ConfigError::MissingSource {
                    id: source_config_id,
                }
                .into())
            }
            Err(e) => return Err(e.into()),
        };
        self.ctx
            .readers
            .resolve(&config)
            .map_err(ConfigError::from)?;

        let job = self.ctx.store.create_job(source_config_id)?;
        tracing::info!(job_id = %job.id, source = %config.name, "scan job submitted");
        self.ctx.events.emit_job_submitted(&JobSubmittedEvent {
            job_id: job.id,
            source_config_id,
        });

        let outcome = match lock(&self.queue).as_ref() {
            Some(sender) => sender.try_send(job.id),
            None => Err(TrySendError::Disconnected(job.id)),
        };
        match outcome {
            Ok(()) => Ok(job.id),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(job_id = %job.id, "dispatch queue full, job rejected");
                self.reject(job.id)?;
                Ok(job.id)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.reject(job.id)?;
                Err(SchedulerError::ShuttingDown)
            }
        }
    }

    fn reject(&self, job_id: JobId) -> Result<(), SchedulerError> {
        self.ctx.store.transition(
            job_id,
            &JobState::Pending,
            JobState::failed(REASON_REJECTED),
            TransitionPayload::none(),
        )?;
        self.ctx.emit_failed(job_id, REASON_REJECTED, false);
        Ok(())
    }

    pub fn get(&self, job_id: JobId) -> Result<ScanJob, SchedulerError> {
        Ok(self.ctx.store.get_job(job_id)?)
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Result<Vec<ScanJob>, SchedulerError> {
        Ok(self.ctx.store.list_jobs()?)
    }

    /// Request cancellation and return the job as it stands.
    ///
    /// Pending jobs (and orphaned in-progress jobs nobody runs) move to
    /// `Failed("cancelled")` immediately. A running job is signalled and
    /// fails at its next row boundary. Terminal jobs are returned unchanged.
    pub fn cancel(&self, job_id: JobId) -> Result<ScanJob, SchedulerError> {
        let signal = |id: JobId| match self.ctx.tokens.get(&id) {
            Some(token) => {
                token.cancel_with(CancelReason::Requested);
                true
            }
            None => false,
        };
        match cancel_job(self.ctx.store.as_ref(), job_id, signal)? {
            CancelOutcome::Unchanged(job) => Ok(job),
            CancelOutcome::Signalled(job) => {
                tracing::info!(job_id = %job_id, state = %job.state, "cancellation requested");
                Ok(job)
            }
            CancelOutcome::Cancelled { from, job } => {
                tracing::info!(job_id = %job_id, from = %from, "scan job cancelled");
                self.ctx.emit_failed(job_id, REASON_CANCELLED, false);
                Ok(job)
            }
        }
    }

    pub fn fetch_report(&self, job_id: JobId) -> Result<Box<dyn Read + Send>, SchedulerError> {
        open_report(self.ctx.store.as_ref(), self.ctx.writer.as_ref(), job_id)
    }

    /// Poll until the job is terminal or `timeout` elapses, returning the
    /// latest snapshot either way.
    pub fn wait(&self, job_id: JobId, timeout: Duration) -> Result<ScanJob, SchedulerError> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let job = self.ctx.store.get_job(job_id)?;
            if job.is_terminal() || deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(job);
            }
            thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    /// Close the queue, cancel running jobs and join the workers. Jobs
    /// still queued are failed as cancelled. Idempotent.
    pub fn shutdown(&self) {
        if self.ctx.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        drop(lock(&self.queue).take());
        for entry in self.ctx.tokens.iter() {
            entry.value().cancel_with(CancelReason::Requested);
        }

        let handles = std::mem::take(&mut *lock(&self.workers));
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked during shutdown");
            }
        }
        tracing::info!("scan service stopped");
    }
}

impl Drop for ScanService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
