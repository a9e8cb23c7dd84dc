//! # lgpd-core
//!
//! Foundation crate for the LGPD scan engine.
//! Defines the data model, collaborator traits, errors, config, events,
//! and tracing setup. Every other crate in the workspace depends on this.

pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod traits;
pub mod tracing;

pub use config::{ComplianceRequirements, LgpdConfig};
pub use models::{
    Cell, DriverKind, Finding, JobId, JobState, PiiCategory, Row, ScanJob, SourceConfig,
    TransitionPayload,
};
