//! # lgpd-scheduler
//!
//! Runs scan jobs on a bounded pool of worker threads. [`ScanService`] is
//! the front end: it validates and persists submissions, enqueues them,
//! and answers job queries. Every state change goes through the job
//! store's compare-and-set, so the store is the single source of truth.
//! [`JobControl`] offers cancel and report access without starting workers.

pub mod control;
mod executor;
pub mod progress;
pub mod service;
mod worker;

pub use control::JobControl;
pub use progress::ProgressTracker;
pub use service::{ScanService, ScanServiceBuilder};
