//! Collaborator seams: storage, source readers, report writers, cancellation.

pub mod cancellation;
pub mod report_writer;
pub mod source_reader;
pub mod storage;

pub use cancellation::{CancelReason, CancellationToken};
pub use report_writer::ReportWriter;
pub use source_reader::{RowIter, ScopedHandle, SourceHandle, SourceReader};
pub use storage::{DeletePolicy, IJobStore, ISourceRegistry};
