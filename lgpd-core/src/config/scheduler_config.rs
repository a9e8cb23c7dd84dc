//! Scan scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the bounded worker pool.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Concurrently executing jobs. Default: 4.
    pub workers: Option<usize>,
    /// Jobs waiting for a worker before submissions are rejected. Default: 64.
    pub queue_capacity: Option<usize>,
    /// Wall-clock budget per job in seconds. Default: 3600.
    pub job_timeout_secs: Option<u64>,
    /// Minimum rows between progress commits. Default: 500.
    pub progress_batch_rows: Option<u64>,
}

impl SchedulerConfig {
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or(4)
    }

    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(64)
    }

    pub fn effective_job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs.unwrap_or(3600))
    }

    pub fn effective_progress_batch_rows(&self) -> u64 {
        self.progress_batch_rows.unwrap_or(500)
    }
}
