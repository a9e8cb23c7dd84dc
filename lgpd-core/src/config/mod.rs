//! Configuration system.
//! TOML-based, layered resolution: CLI > env > project > user > defaults.

pub mod compliance;
pub mod detection_config;
pub mod lgpd_config;
pub mod report_config;
pub mod scheduler_config;
pub mod storage_config;

pub use compliance::ComplianceRequirements;
pub use detection_config::{DetectionConfig, Granularity};
pub use lgpd_config::{CliOverrides, LgpdConfig};
pub use report_config::ReportConfig;
pub use scheduler_config::SchedulerConfig;
pub use storage_config::StorageConfig;
