//! Cooperative cancellation token.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::models::scan_job::{REASON_CANCELLED, REASON_TIMEOUT};

/// Why a token was tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// A caller asked for the job to stop.
    Requested,
    /// The job exceeded its wall-clock budget.
    Timeout,
}

impl CancelReason {
    /// Failure reason persisted on the job.
    pub fn as_reason(&self) -> &'static str {
        match self {
            Self::Requested => REASON_CANCELLED,
            Self::Timeout => REASON_TIMEOUT,
        }
    }
}

const NOT_CANCELLED: u8 = 0;
const REQUESTED: u8 = 1;
const TIMED_OUT: u8 = 2;

/// Default cancellation token. Clones share the same flag.
/// The first reason recorded wins.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    state: Arc<AtomicU8>,
}

impl CancellationToken {
    /// Create a new cancellation token (not cancelled).
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(NOT_CANCELLED)),
        }
    }

    /// Trip the token with an explicit reason.
    pub fn cancel_with(&self, reason: CancelReason) {
        let code = match reason {
            CancelReason::Requested => REQUESTED,
            CancelReason::Timeout => TIMED_OUT,
        };
        let _ = self
            .state
            .compare_exchange(NOT_CANCELLED, code, Ordering::AcqRel, Ordering::Acquire);
    }

    /// The reason the token was tripped, if it was.
    pub fn reason(&self) -> Option<CancelReason> {
        match self.state.load(Ordering::Acquire) {
            REQUESTED => Some(CancelReason::Requested),
            TIMED_OUT => Some(CancelReason::Timeout),
            _ => None,
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
