//! Report writer contract.

use std::io::Read;

use crate::config::ComplianceRequirements;
use crate::errors::WriteError;
use crate::models::Finding;

/// Persists a findings report and reopens it by reference.
///
/// The returned artifact reference is opaque to the core; it is stored
/// verbatim on the job and handed back to `open`.
pub trait ReportWriter: Send + Sync {
    /// Persist the ordered findings with the compliance verdict derived
    /// from `requirements`. Returns the artifact reference.
    fn write(
        &self,
        findings: &[Finding],
        requirements: &ComplianceRequirements,
    ) -> Result<String, WriteError>;

    /// Open a previously written artifact for streaming.
    fn open(&self, artifact_ref: &str) -> Result<Box<dyn Read + Send>, WriteError>;
}
