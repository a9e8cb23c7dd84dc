//! Sync bridge for the async `sqlx` drivers.

use std::future::Future;
use std::time::Duration;

use lgpd_core::errors::SourceError;
use tokio::runtime::Runtime;

pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A runtime owned by a single handle. Never shared across threads.
pub(crate) fn current_thread_runtime(target: &str) -> Result<Runtime, SourceError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| SourceError::Connection {
            target: target.to_string(),
            message: format!("runtime error: {e}"),
        })
}

/// Drive a connect future with an upper bound on how long it may take.
pub(crate) fn connect_with_timeout<C, F>(
    rt: &Runtime,
    target: &str,
    timeout: Duration,
    connect: F,
) -> Result<C, SourceError>
where
    F: Future<Output = Result<C, sqlx::Error>>,
{
    match rt.block_on(async { tokio::time::timeout(timeout, connect).await }) {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(e)) => Err(SourceError::Connection {
            target: target.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Err(SourceError::Connection {
            target: target.to_string(),
            message: format!("timed out after {}s", timeout.as_secs()),
        }),
    }
}
