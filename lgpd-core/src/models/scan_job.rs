//! Scan jobs and their lifecycle state machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Finding;

/// Failure reason recorded when a caller cancels a job.
pub const REASON_CANCELLED: &str = "cancelled";
/// Failure reason recorded when a job exceeds its wall-clock budget.
pub const REASON_TIMEOUT: &str = "timeout";
/// Failure reason recorded when the dispatch queue is full at submit time.
pub const REASON_REJECTED: &str = "rejected";

/// Identifier of a scan job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a scan job.
///
/// ```text
/// Pending -> InProgress(0) -> InProgress(p' >= p) -> InProgress(100) -> Completed
///    |             |
///    +-------------+--> Failed(reason)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Pending,
    InProgress { progress: u8 },
    Completed,
    Failed { reason: String },
}

impl JobState {
    /// Bounded enumeration string persisted in the `state` column.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress { .. } => "in_progress",
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }

    /// Progress carried by the state itself (InProgress only).
    pub fn progress(&self) -> Option<u8> {
        match self {
            Self::InProgress { progress } => Some(*progress),
            _ => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: &JobState) -> bool {
        match (self, next) {
            (Self::Pending, Self::InProgress { progress: 0 }) => true,
            (Self::Pending, Self::Failed { .. }) => true,
            (Self::InProgress { progress: p }, Self::InProgress { progress: q }) => {
                q >= p && *q <= 100
            }
            (Self::InProgress { progress: 100 }, Self::Completed) => true,
            (Self::InProgress { .. }, Self::Failed { .. }) => true,
            _ => false,
        }
    }

    /// Rebuild a state from its persisted columns.
    pub fn from_columns(name: &str, progress: u8, reason: Option<String>) -> Option<Self> {
        match name {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress { progress }),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed {
                reason: reason.unwrap_or_default(),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress { progress } => write!(f, "in_progress({progress}%)"),
            Self::Failed { reason } => write!(f, "failed({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Extra columns written atomically with a state transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionPayload {
    pub findings: Option<Vec<Finding>>,
    pub report_ref: Option<String>,
}

impl TransitionPayload {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_findings(findings: Vec<Finding>) -> Self {
        Self {
            findings: Some(findings),
            report_ref: None,
        }
    }

    pub fn report(mut self, report_ref: impl Into<String>) -> Self {
        self.report_ref = Some(report_ref.into());
        self
    }
}

/// One invocation of detection against one source config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: JobId,
    pub source_config_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub state: JobState,
    /// Last committed progress. Kept after a failure so callers can see
    /// how far the scan got.
    pub progress_percent: u8,
    pub findings: Option<Vec<Finding>>,
    pub report_ref: Option<String>,
}

impl ScanJob {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
