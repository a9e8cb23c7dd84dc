//! # lgpd-report
//!
//! Compliance report artifacts. Reports are JSON documents written
//! atomically (temp file + rename) into a configured directory; the
//! artifact reference handed back to the scheduler is the file name.

pub mod document;
pub mod json_writer;

pub use document::ComplianceReport;
pub use json_writer::JsonReportWriter;
