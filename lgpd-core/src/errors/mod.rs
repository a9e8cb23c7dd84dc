//! Error handling for the scan engine.
//! One error enum per subsystem, `thiserror` only.

pub mod config_error;
pub mod detection_error;
pub mod error_code;
pub mod scheduler_error;
pub mod source_error;
pub mod storage_error;
pub mod write_error;

pub use config_error::ConfigError;
pub use detection_error::DetectionError;
pub use error_code::ErrorCode;
pub use scheduler_error::SchedulerError;
pub use source_error::SourceError;
pub use storage_error::StorageError;
pub use write_error::WriteError;
