//! ErrorCode trait: stable machine-readable codes for every error enum.

/// Every error enum implements this to expose a structured code string
/// to outer layers (CLI exit reporting, job failure reasons).
pub trait ErrorCode {
    /// Returns the error code string (e.g., "CONNECTION_ERROR").
    fn error_code(&self) -> &'static str;

    /// Returns the formatted string: `[ERROR_CODE] message`.
    fn coded_string(&self) -> String
    where
        Self: std::fmt::Display,
    {
        format!("[{}] {}", self.error_code(), self)
    }
}

pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const UNSUPPORTED_DRIVER: &str = "UNSUPPORTED_DRIVER";
pub const SOURCE_ERROR: &str = "SOURCE_ERROR";
pub const CONNECTION_ERROR: &str = "CONNECTION_ERROR";
pub const DETECTION_ERROR: &str = "DETECTION_ERROR";
pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
pub const MIGRATION_FAILED: &str = "MIGRATION_FAILED";
pub const NOT_FOUND: &str = "NOT_FOUND";
pub const STALE_STATE: &str = "STALE_STATE";
pub const INVALID_TRANSITION: &str = "INVALID_TRANSITION";
pub const CONFLICT: &str = "CONFLICT";
pub const WRITE_ERROR: &str = "WRITE_ERROR";
pub const CANCELLED: &str = "CANCELLED";
pub const SHUTTING_DOWN: &str = "SHUTTING_DOWN";
pub const WORKER_ERROR: &str = "WORKER_ERROR";
