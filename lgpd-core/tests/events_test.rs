//! Tests for the job event dispatcher.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lgpd_core::events::*;
use lgpd_core::models::JobId;

#[derive(Default)]
struct CountingHandler {
    started: AtomicUsize,
    progress: AtomicUsize,
    failed: AtomicUsize,
}

impl JobEventHandler for CountingHandler {
    fn on_job_started(&self, _event: &JobStartedEvent) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    fn on_job_progress(&self, _event: &JobProgressEvent) {
        self.progress.fetch_add(1, Ordering::Relaxed);
    }

    fn on_job_failed(&self, _event: &JobFailedEvent) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }
}

struct PanickingHandler;

impl JobEventHandler for PanickingHandler {
    fn on_job_started(&self, _event: &JobStartedEvent) {
        panic!("handler bug");
    }
}

#[test]
fn empty_dispatcher_is_noop() {
    let dispatcher = EventDispatcher::new();
    assert_eq!(dispatcher.handler_count(), 0);
    dispatcher.emit_job_progress(&JobProgressEvent {
        job_id: JobId(1),
        progress: 10,
        rows_scanned: 100,
    });
}

#[test]
fn events_reach_registered_handlers() {
    let handler = Arc::new(CountingHandler::default());
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(handler.clone());

    dispatcher.emit_job_started(&JobStartedEvent {
        job_id: JobId(7),
        source: "sqlite://crm.db".into(),
    });
    for p in [10, 20, 30] {
        dispatcher.emit_job_progress(&JobProgressEvent {
            job_id: JobId(7),
            progress: p,
            rows_scanned: u64::from(p) * 10,
        });
    }
    dispatcher.emit_job_failed(&JobFailedEvent {
        job_id: JobId(7),
        reason: "cancelled".into(),
        findings_retained: false,
    });

    assert_eq!(handler.started.load(Ordering::Relaxed), 1);
    assert_eq!(handler.progress.load(Ordering::Relaxed), 3);
    assert_eq!(handler.failed.load(Ordering::Relaxed), 1);
}

#[test]
fn panicking_handler_does_not_block_others() {
    let counting = Arc::new(CountingHandler::default());
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(Arc::new(PanickingHandler));
    dispatcher.register(counting.clone());

    dispatcher.emit_job_started(&JobStartedEvent {
        job_id: JobId(1),
        source: "x".into(),
    });
    assert_eq!(counting.started.load(Ordering::Relaxed), 1);
}
