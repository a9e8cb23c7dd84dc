//! EventDispatcher: synchronous fan-out to registered handlers.

use std::sync::Arc;

use super::handler::JobEventHandler;
use super::types::*;

/// Synchronous event dispatcher wrapping a list of handlers.
///
/// A panicking handler is logged and does not prevent later handlers
/// from receiving the event, nor does it reach the worker that emitted it.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn JobEventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event handler.
    pub fn register(&mut self, handler: Arc<dyn JobEventHandler>) {
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    fn emit<F: Fn(&dyn JobEventHandler)>(&self, event_name: &'static str, f: F) {
        for handler in &self.handlers {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                f(handler.as_ref());
            }));
            if result.is_err() {
                tracing::warn!(event = event_name, "event handler panicked");
            }
        }
    }

    pub fn emit_job_submitted(&self, event: &JobSubmittedEvent) {
        self.emit("job_submitted", |h| h.on_job_submitted(event));
    }

    pub fn emit_job_started(&self, event: &JobStartedEvent) {
        self.emit("job_started", |h| h.on_job_started(event));
    }

    pub fn emit_job_progress(&self, event: &JobProgressEvent) {
        self.emit("job_progress", |h| h.on_job_progress(event));
    }

    pub fn emit_job_completed(&self, event: &JobCompletedEvent) {
        self.emit("job_completed", |h| h.on_job_completed(event));
    }

    pub fn emit_job_failed(&self, event: &JobFailedEvent) {
        self.emit("job_failed", |h| h.on_job_failed(event));
    }
}
