//! Fixed pool of OS threads draining the dispatch queue.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use lgpd_core::errors::SchedulerError;
use lgpd_core::models::JobId;

use crate::executor::{self, JobContext};

/// Spawn `count` workers. Each exits once the queue is closed and drained.
pub(crate) fn spawn_workers(
    ctx: &Arc<JobContext>,
    queue: &Receiver<JobId>,
    count: usize,
) -> Result<Vec<JoinHandle<()>>, SchedulerError> {
    (0..count)
        .map(|worker_id| {
            let ctx = Arc::clone(ctx);
            let queue = queue.clone();
            thread::Builder::new()
                .name(format!("lgpd-worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, &ctx, &queue))
                .map_err(|e| SchedulerError::WorkerSpawn {
                    message: e.to_string(),
                })
        })
        .collect()
}

fn worker_loop(worker_id: usize, ctx: &JobContext, queue: &Receiver<JobId>) {
    tracing::debug!(worker_id, "worker started");
    for job_id in queue.iter() {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| executor::run_job(ctx, job_id)));
        if let Err(payload) = outcome {
            let message = panic_message(payload.as_ref());
            tracing::error!(worker_id, job_id = %job_id, panic = %message, "executor panicked");
            executor::fail_abandoned(ctx, job_id, &format!("internal error: {message}"));
        }
    }
    tracing::debug!(worker_id, "worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_readable() {
        let static_str = panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(static_str.as_ref()), "boom");

        let formatted = panic::catch_unwind(|| panic!("row {}", 7)).unwrap_err();
        assert_eq!(panic_message(formatted.as_ref()), "row 7");

        let other = panic::catch_unwind(|| std::panic::panic_any(42u8)).unwrap_err();
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }
}
