//! Data model: source configs, scan jobs, findings, and scanned rows.

pub mod finding;
pub mod row;
pub mod scan_job;
pub mod source_config;

pub use finding::{totals_by_category, Finding, PiiCategory};
pub use row::{Cell, Row};
pub use scan_job::{JobId, JobState, ScanJob, TransitionPayload};
pub use source_config::{DriverKind, NewSourceConfig, SourceConfig};
