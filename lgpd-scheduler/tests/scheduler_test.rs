use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use lgpd_core::config::SchedulerConfig;
use lgpd_core::errors::{ConfigError, SchedulerError, SourceError, WriteError};
use lgpd_core::events::{JobCompletedEvent, JobEventHandler, JobFailedEvent, JobProgressEvent};
use lgpd_core::models::{
    DriverKind, JobId, JobState, NewSourceConfig, PiiCategory, Row, ScanJob, SourceConfig,
    TransitionPayload,
};
use lgpd_core::traits::{IJobStore, ISourceRegistry, ReportWriter, SourceHandle, SourceReader};
use lgpd_core::{ComplianceRequirements, Finding};
use lgpd_report::JsonReportWriter;
use lgpd_scheduler::{JobControl, ScanService};
use lgpd_sources::ReaderRegistry;
use lgpd_storage::StorageEngine;
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(30);

// ---- Fakes ----------------------------------------------------------------

/// Shared behaviour and counters for every handle a `FakeReader` opens.
struct Script {
    rows: u64,
    /// Every n-th row carries an e-mail address.
    pii_every: u64,
    /// The first handle to reach this row index blocks until released.
    gate_at: Option<u64>,
    gate: Mutex<Option<Receiver<()>>>,
    refuse_connection: bool,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl Script {
    fn new(rows: u64) -> Self {
        Self {
            rows,
            pii_every: 5,
            gate_at: None,
            gate: Mutex::new(None),
            refuse_connection: false,
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        }
    }

    /// Returns the sender that releases the gate.
    fn gated_at(mut self, row: u64) -> (Self, Sender<()>) {
        let (tx, rx) = mpsc::channel();
        self.gate_at = Some(row);
        self.gate = Mutex::new(Some(rx));
        (self, tx)
    }

    fn refusing(mut self) -> Self {
        self.refuse_connection = true;
        self
    }

    fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

struct FakeReader {
    script: Arc<Script>,
}

impl SourceReader for FakeReader {
    fn driver(&self) -> DriverKind {
        DriverKind::Sqlite
    }

    fn open(&self, config: &SourceConfig) -> Result<Box<dyn SourceHandle>, SourceError> {
        if self.script.refuse_connection {
            return Err(SourceError::Connection {
                target: config.target(),
                message: "connection refused".to_string(),
            });
        }
        self.script.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeHandle {
            script: Arc::clone(&self.script),
            next: 0,
            closed: false,
        }))
    }
}

struct FakeHandle {
    script: Arc<Script>,
    next: u64,
    closed: bool,
}

impl SourceHandle for FakeHandle {
    fn next_row(&mut self) -> Result<Option<Row>, SourceError> {
        if self.closed || self.next >= self.script.rows {
            return Ok(None);
        }
        if self.script.gate_at == Some(self.next) {
            let gate = self.script.gate.lock().unwrap().take();
            if let Some(rx) = gate {
                let _ = rx.recv_timeout(WAIT);
            }
        }
        let i = self.next;
        self.next += 1;
        let email = format!("user{i}@example.com");
        let value = if i % self.script.pii_every == 0 {
            email.as_str()
        } else {
            "nothing to see"
        };
        Ok(Some(Row::new("customers", i).with_cell("contact", Some(value))))
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.script.rows)
    }

    fn close(&mut self) -> Result<(), SourceError> {
        if !self.closed {
            self.closed = true;
            self.script.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct FailingWriter;

impl ReportWriter for FailingWriter {
    fn write(&self, _: &[Finding], _: &ComplianceRequirements) -> Result<String, WriteError> {
        Err(WriteError::Io {
            path: PathBuf::from("/reports/out.json"),
            source: io::Error::new(io::ErrorKind::Other, "disk full"),
        })
    }

    fn open(&self, artifact_ref: &str) -> Result<Box<dyn Read + Send>, WriteError> {
        Err(WriteError::ArtifactMissing {
            artifact: artifact_ref.to_string(),
        })
    }
}

#[derive(Default)]
struct Recorder {
    progress: Mutex<Vec<(JobId, u8)>>,
    terminal: Mutex<Vec<JobId>>,
}

impl Recorder {
    fn progress_of(&self, job_id: JobId) -> Vec<u8> {
        self.progress
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == job_id)
            .map(|(_, p)| *p)
            .collect()
    }

    fn terminal_count(&self, job_id: JobId) -> usize {
        self.terminal.lock().unwrap().iter().filter(|id| **id == job_id).count()
    }
}

impl JobEventHandler for Recorder {
    fn on_job_progress(&self, event: &JobProgressEvent) {
        self.progress.lock().unwrap().push((event.job_id, event.progress));
    }

    fn on_job_completed(&self, event: &JobCompletedEvent) {
        self.terminal.lock().unwrap().push(event.job_id);
    }

    fn on_job_failed(&self, event: &JobFailedEvent) {
        self.terminal.lock().unwrap().push(event.job_id);
    }
}

// ---- Harness --------------------------------------------------------------

struct Harness {
    dir: TempDir,
    store: Arc<StorageEngine>,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(StorageEngine::open(&dir.path().join("lgpd.db"), 2).unwrap());
        Self { dir, store }
    }

    fn register(&self, name: &str, driver: &str, host: &str, port: u16) -> i64 {
        self.store
            .register(&NewSourceConfig {
                name: name.to_string(),
                host: host.to_string(),
                port,
                username: "scanner".to_string(),
                password: "s3cret".to_string(),
                database_name: "crm".to_string(),
                driver: driver.to_string(),
            })
            .unwrap()
            .id
    }

    fn fake_source(&self) -> i64 {
        self.register("crm", "sqlite", "", 0)
    }

    fn report_writer(&self) -> Arc<dyn ReportWriter> {
        Arc::new(JsonReportWriter::new(self.dir.path().join("reports")))
    }

    fn service(&self, script: &Arc<Script>, config: SchedulerConfig) -> ScanService {
        self.service_with(script, config, self.report_writer(), None)
    }

    fn service_with(
        &self,
        script: &Arc<Script>,
        config: SchedulerConfig,
        writer: Arc<dyn ReportWriter>,
        recorder: Option<Arc<Recorder>>,
    ) -> ScanService {
        let mut readers = ReaderRegistry::new();
        readers.register(Arc::new(FakeReader {
            script: Arc::clone(script),
        }));
        let mut builder = ScanService::builder(self.store.clone(), self.store.clone(), writer)
            .readers(readers)
            .config(&config);
        if let Some(recorder) = recorder {
            builder = builder.event_handler(recorder);
        }
        builder.start().unwrap()
    }
}

fn scheduler_config(workers: usize, queue_capacity: usize, batch: u64) -> SchedulerConfig {
    SchedulerConfig {
        workers: Some(workers),
        queue_capacity: Some(queue_capacity),
        job_timeout_secs: None,
        progress_batch_rows: Some(batch),
    }
}

fn wait_until(service: &ScanService, job_id: JobId, pred: impl Fn(&ScanJob) -> bool) -> ScanJob {
    let deadline = std::time::Instant::now() + WAIT;
    loop {
        let job = service.get(job_id).unwrap();
        if pred(&job) {
            return job;
        }
        assert!(std::time::Instant::now() < deadline, "timed out waiting on {job:?}");
        thread::sleep(Duration::from_millis(5));
    }
}

fn failure_reason(job: &ScanJob) -> &str {
    job.state.failure_reason().unwrap_or_else(|| panic!("not failed: {job:?}"))
}

// ---- Submission -----------------------------------------------------------

#[test]
fn unsupported_driver_is_rejected_without_creating_a_job() {
    let h = Harness::new();
    let script = Arc::new(Script::new(10));
    let service = h.service(&script, scheduler_config(1, 4, 5));

    let oracle = h.register("legacy", "oracle", "db.internal", 1521);
    let err = service.submit(oracle).unwrap_err();
    assert!(
        matches!(err, SchedulerError::Configuration(ConfigError::UnsupportedDriver { ref driver }) if driver == "oracle"),
        "{err:?}"
    );

    // Known driver, but no reader registered for it.
    let pg = h.register("warehouse", "postgres", "db.internal", 5432);
    assert!(matches!(
        service.submit(pg),
        Err(SchedulerError::Configuration(ConfigError::UnsupportedDriver { .. }))
    ));

    assert_eq!(h.store.count_jobs().unwrap(), 0);
    assert_eq!(script.opened(), 0);
}

#[test]
fn missing_source_is_a_configuration_error() {
    let h = Harness::new();
    let service = h.service(&Arc::new(Script::new(1)), scheduler_config(1, 4, 5));
    let err = service.submit(999).unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::Configuration(ConfigError::MissingSource { id: 999 })
    ));
    assert_eq!(h.store.count_jobs().unwrap(), 0);
}

// ---- Lifecycle ------------------------------------------------------------

#[test]
fn job_completes_with_monotone_progress_and_one_terminal_event() {
    let h = Harness::new();
    let script = Arc::new(Script::new(50));
    let recorder = Arc::new(Recorder::default());
    let service = h.service_with(
        &script,
        scheduler_config(2, 4, 5),
        h.report_writer(),
        Some(recorder.clone()),
    );

    let job_id = service.submit(h.fake_source()).unwrap();
    let job = service.wait(job_id, WAIT).unwrap();

    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.progress_percent, 100);
    let findings = job.findings.clone().unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].category, PiiCategory::Email);
    assert_eq!(findings[0].occurrence_count, 10);
    assert!(job.report_ref.is_some());

    let progress = recorder.progress_of(job_id);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
    assert_eq!(progress.last(), Some(&100));
    assert_eq!(recorder.terminal_count(job_id), 1);
    assert_eq!((script.opened(), script.closed()), (1, 1));

    let mut body = String::new();
    service.fetch_report(job_id).unwrap().read_to_string(&mut body).unwrap();
    assert!(body.contains("\"email\""), "{body}");
}

#[test]
fn source_connection_failure_fails_the_job() {
    let h = Harness::new();
    let script = Arc::new(Script::new(10).refusing());
    let service = h.service(&script, scheduler_config(1, 4, 5));

    let job_id = service.submit(h.fake_source()).unwrap();
    let job = service.wait(job_id, WAIT).unwrap();
    assert!(failure_reason(&job).contains("connection"), "{job:?}");
    assert_eq!(job.findings, None);
    assert!(matches!(
        service.fetch_report(job_id),
        Err(SchedulerError::ReportNotFound { .. })
    ));
}

#[test]
fn unreachable_postgres_fails_with_connection_reason() {
    let h = Harness::new();
    let pg = h.register("warehouse", "postgres", "127.0.0.1", 1);
    let service = ScanService::builder(h.store.clone(), h.store.clone(), h.report_writer())
        .readers(ReaderRegistry::with_defaults())
        .config(&scheduler_config(1, 4, 5))
        .start()
        .unwrap();

    let job_id = service.submit(pg).unwrap();
    let job = service.wait(job_id, WAIT).unwrap();
    let reason = failure_reason(&job);
    assert!(reason.contains("connection"), "{reason}");
    assert!(!reason.contains("s3cret"));
}

#[test]
fn report_write_failure_keeps_findings() {
    let h = Harness::new();
    let script = Arc::new(Script::new(20));
    let service = h.service_with(&script, scheduler_config(1, 4, 5), Arc::new(FailingWriter), None);

    let job_id = service.submit(h.fake_source()).unwrap();
    let job = service.wait(job_id, WAIT).unwrap();

    assert!(failure_reason(&job).starts_with("report write failed"), "{job:?}");
    assert_eq!(job.report_ref, None);
    assert_eq!(job.progress_percent, 100);
    let findings = job.findings.unwrap();
    assert_eq!(findings[0].occurrence_count, 4);
}

// ---- Cancellation and limits ---------------------------------------------

#[test]
fn cancel_mid_scan_closes_the_handle() {
    let h = Harness::new();
    let (script, release) = Script::new(100).gated_at(40);
    let script = Arc::new(script);
    let service = h.service(&script, scheduler_config(1, 4, 10));

    let job_id = service.submit(h.fake_source()).unwrap();
    wait_until(&service, job_id, |job| job.state == JobState::InProgress { progress: 40 });

    let snapshot = service.cancel(job_id).unwrap();
    assert!(matches!(snapshot.state, JobState::InProgress { .. }));
    release.send(()).unwrap();

    let job = service.wait(job_id, WAIT).unwrap();
    assert_eq!(failure_reason(&job), "cancelled");
    assert_eq!(job.progress_percent, 40);
    assert_eq!(script.closed(), 1);

    // Cancelling a terminal job is a no-op.
    assert_eq!(service.cancel(job_id).unwrap().state, job.state);
}

#[test]
fn cancel_pending_job_never_opens_the_source() {
    let h = Harness::new();
    let (script, release) = Script::new(20).gated_at(0);
    let script = Arc::new(script);
    let service = h.service(&script, scheduler_config(1, 4, 5));
    let source = h.fake_source();

    let running = service.submit(source).unwrap();
    wait_until(&service, running, |job| matches!(job.state, JobState::InProgress { .. }));
    let queued = service.submit(source).unwrap();

    let cancelled = service.cancel(queued).unwrap();
    assert_eq!(failure_reason(&cancelled), "cancelled");

    release.send(()).unwrap();
    assert_eq!(service.wait(running, WAIT).unwrap().state, JobState::Completed);
    service.shutdown();

    assert_eq!(failure_reason(&service.get(queued).unwrap()), "cancelled");
    assert_eq!(script.opened(), 1);
}

#[test]
fn job_over_budget_times_out() {
    let h = Harness::new();
    let script = Arc::new(Script::new(100));
    let mut readers = ReaderRegistry::new();
    readers.register(Arc::new(FakeReader {
        script: Arc::clone(&script),
    }));
    let service = ScanService::builder(h.store.clone(), h.store.clone(), h.report_writer())
        .readers(readers)
        .config(&scheduler_config(1, 4, 5))
        .job_timeout(Duration::ZERO)
        .start()
        .unwrap();

    let job_id = service.submit(h.fake_source()).unwrap();
    let job = service.wait(job_id, WAIT).unwrap();
    assert_eq!(failure_reason(&job), "timeout");
    assert_eq!(script.closed(), 1);
}

#[test]
fn full_queue_rejects_but_returns_the_id() {
    let h = Harness::new();
    let (script, release) = Script::new(10).gated_at(0);
    let script = Arc::new(script);
    let service = h.service(&script, scheduler_config(1, 1, 5));
    let source = h.fake_source();

    let running = service.submit(source).unwrap();
    wait_until(&service, running, |job| matches!(job.state, JobState::InProgress { .. }));
    let queued = service.submit(source).unwrap();
    let rejected = service.submit(source).unwrap();

    assert_eq!(failure_reason(&service.get(rejected).unwrap()), "rejected");

    release.send(()).unwrap();
    assert_eq!(service.wait(running, WAIT).unwrap().state, JobState::Completed);
    assert_eq!(service.wait(queued, WAIT).unwrap().state, JobState::Completed);
    assert_eq!(h.store.count_jobs().unwrap(), 3);
}

// ---- Startup and shutdown -------------------------------------------------

#[test]
fn orphaned_jobs_are_left_alone_and_can_be_cancelled() {
    let h = Harness::new();
    let source = h.fake_source();
    let orphan = h.store.create_job(source).unwrap();
    h.store
        .transition(
            orphan.id,
            &JobState::Pending,
            JobState::InProgress { progress: 0 },
            TransitionPayload::none(),
        )
        .unwrap();

    let script = Arc::new(Script::new(5));
    let service = h.service(&script, scheduler_config(1, 4, 5));
    assert_eq!(
        service.get(orphan.id).unwrap().state,
        JobState::InProgress { progress: 0 }
    );
    assert_eq!(script.opened(), 0);

    let cancelled = service.cancel(orphan.id).unwrap();
    assert_eq!(failure_reason(&cancelled), "cancelled");
}

#[test]
fn shutdown_cancels_running_and_queued_jobs() {
    let h = Harness::new();
    let (script, release) = Script::new(10_000).gated_at(1);
    let script = Arc::new(script);
    let service = h.service(&script, scheduler_config(1, 4, 100));
    let source = h.fake_source();

    let running = service.submit(source).unwrap();
    wait_until(&service, running, |job| matches!(job.state, JobState::InProgress { .. }));
    let queued = service.submit(source).unwrap();

    thread::scope(|s| {
        s.spawn(|| service.shutdown());
        thread::sleep(Duration::from_millis(100));
        release.send(()).unwrap();
    });

    assert_eq!(failure_reason(&service.get(running).unwrap()), "cancelled");
    assert_eq!(failure_reason(&service.get(queued).unwrap()), "cancelled");
    assert_eq!(script.closed(), script.opened());
    assert!(matches!(service.submit(source), Err(SchedulerError::ShuttingDown)));
    assert!(service.list().unwrap().iter().all(ScanJob::is_terminal));
}

#[test]
fn job_control_cancels_and_reads_reports_without_workers() {
    let h = Harness::new();
    let source = h.fake_source();

    let script = Arc::new(Script::new(20));
    let service = h.service(&script, scheduler_config(1, 4, 5));
    let done = service.submit(source).unwrap();
    assert_eq!(service.wait(done, WAIT).unwrap().state, JobState::Completed);
    service.shutdown();

    // Owned by some other process: no token here, only the stored state.
    let elsewhere = h.store.create_job(source).unwrap();
    h.store
        .transition(
            elsewhere.id,
            &JobState::Pending,
            JobState::InProgress { progress: 40 },
            TransitionPayload::none(),
        )
        .unwrap();

    let control = JobControl::new(h.store.clone(), h.report_writer());
    let cancelled = control.cancel(elsewhere.id).unwrap();
    assert_eq!(failure_reason(&cancelled), "cancelled");
    assert_eq!(cancelled.progress_percent, 40);
    assert_eq!(control.cancel(elsewhere.id).unwrap().state, cancelled.state);
    assert_eq!(control.cancel(done).unwrap().state, JobState::Completed);

    let mut body = String::new();
    control.fetch_report(done).unwrap().read_to_string(&mut body).unwrap();
    assert!(body.contains("\"email\""), "{body}");
    assert!(matches!(
        control.fetch_report(elsewhere.id),
        Err(SchedulerError::ReportNotFound { .. })
    ));
    assert_eq!(script.opened(), 1);
}
