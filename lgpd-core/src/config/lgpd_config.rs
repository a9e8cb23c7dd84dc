//! Top-level configuration with layered resolution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{
    ComplianceRequirements, DetectionConfig, Granularity, ReportConfig, SchedulerConfig,
    StorageConfig,
};
use crate::errors::ConfigError;

/// Project config file name looked up in the working root.
pub const PROJECT_CONFIG_FILE: &str = "lgpd.toml";

const MAX_WORKERS: usize = 256;

/// Top-level configuration aggregating all sub-configs.
///
/// Resolution order (highest priority first):
/// 1. CLI flags (applied via `apply_cli_overrides`)
/// 2. Environment variables (`LGPD_*`)
/// 3. Project config (`lgpd.toml` in the working root)
/// 4. User config (`~/.lgpd/config.toml`)
/// 5. Compiled defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LgpdConfig {
    pub storage: StorageConfig,
    pub scheduler: SchedulerConfig,
    pub detection: DetectionConfig,
    pub report: ReportConfig,
    /// Requirement overrides on top of the default requirement set.
    #[serde(default)]
    pub compliance: BTreeMap<String, bool>,
}

/// CLI override arguments that can be applied to a config.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub db_path: Option<PathBuf>,
    pub workers: Option<usize>,
    pub report_dir: Option<PathBuf>,
    pub granularity: Option<Granularity>,
}

impl LgpdConfig {
    /// Load configuration with layered resolution rooted at `root`.
    pub fn load(root: &Path, cli_overrides: Option<&CliOverrides>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Layer 4 (lowest priority): user config
        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                match Self::merge_toml_file(&mut config, &user_config_path) {
                    Ok(()) => {}
                    Err(e @ ConfigError::ParseError { .. }) => return Err(e),
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring unreadable user config");
                    }
                }
            }
        }

        // Layer 3: project config
        let project_config_path = root.join(PROJECT_CONFIG_FILE);
        if project_config_path.exists() {
            Self::merge_toml_file(&mut config, &project_config_path)?;
        }

        // Layer 2: environment variables
        Self::apply_env_overrides(&mut config);

        // Layer 1 (highest priority): CLI flags
        if let Some(cli) = cli_overrides {
            Self::apply_cli_overrides(&mut config, cli);
        }

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML string (for testing).
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate the configuration values.
    pub fn validate(config: &LgpdConfig) -> Result<(), ConfigError> {
        if let Some(workers) = config.scheduler.workers {
            if workers == 0 || workers > MAX_WORKERS {
                return Err(ConfigError::ValidationFailed {
                    field: "scheduler.workers".to_string(),
                    message: format!("must be between 1 and {MAX_WORKERS}"),
                });
            }
        }
        if config.scheduler.queue_capacity == Some(0) {
            return Err(ConfigError::ValidationFailed {
                field: "scheduler.queue_capacity".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if config.scheduler.job_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationFailed {
                field: "scheduler.job_timeout_secs".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if config.scheduler.progress_batch_rows == Some(0) {
            return Err(ConfigError::ValidationFailed {
                field: "scheduler.progress_batch_rows".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if config.detection.detail_cap == Some(0) {
            return Err(ConfigError::ValidationFailed {
                field: "detection.detail_cap".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if config.detection.max_cell_bytes == Some(0) {
            return Err(ConfigError::ValidationFailed {
                field: "detection.max_cell_bytes".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if config.storage.read_pool_size == Some(0) {
            return Err(ConfigError::ValidationFailed {
                field: "storage.read_pool_size".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// The requirement set passed to the report writer.
    pub fn compliance_requirements(&self) -> ComplianceRequirements {
        ComplianceRequirements::from_overrides(&self.compliance)
    }

    /// Returns the user config path: `~/.lgpd/config.toml`.
    fn user_config_path() -> Option<PathBuf> {
        home_dir().map(|h| h.join(".lgpd").join("config.toml"))
    }

    /// Merge a TOML file into the existing config.
    /// Unknown keys are silently ignored (forward-compatible).
    fn merge_toml_file(config: &mut LgpdConfig, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let file_config: LgpdConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Self::merge(config, &file_config);
        Ok(())
    }

    /// Merge `other` into `base`; `other` wins wherever it has a value.
    fn merge(base: &mut LgpdConfig, other: &LgpdConfig) {
        // Storage
        if other.storage.db_path.is_some() {
            base.storage.db_path = other.storage.db_path.clone();
        }
        if other.storage.read_pool_size.is_some() {
            base.storage.read_pool_size = other.storage.read_pool_size;
        }

        // Scheduler
        if other.scheduler.workers.is_some() {
            base.scheduler.workers = other.scheduler.workers;
        }
        if other.scheduler.queue_capacity.is_some() {
            base.scheduler.queue_capacity = other.scheduler.queue_capacity;
        }
        if other.scheduler.job_timeout_secs.is_some() {
            base.scheduler.job_timeout_secs = other.scheduler.job_timeout_secs;
        }
        if other.scheduler.progress_batch_rows.is_some() {
            base.scheduler.progress_batch_rows = other.scheduler.progress_batch_rows;
        }

        // Detection
        if other.detection.granularity.is_some() {
            base.detection.granularity = other.detection.granularity;
        }
        if other.detection.detail_cap.is_some() {
            base.detection.detail_cap = other.detection.detail_cap;
        }
        if !other.detection.pattern_files.is_empty() {
            base.detection.pattern_files = other.detection.pattern_files.clone();
        }
        if !other.detection.disabled_detectors.is_empty() {
            base.detection.disabled_detectors = other.detection.disabled_detectors.clone();
        }
        if other.detection.max_cell_bytes.is_some() {
            base.detection.max_cell_bytes = other.detection.max_cell_bytes;
        }

        // Report
        if other.report.output_dir.is_some() {
            base.report.output_dir = other.report.output_dir.clone();
        }

        // Compliance: per-requirement override
        base.compliance
            .extend(other.compliance.iter().map(|(k, v)| (k.clone(), *v)));
    }

    /// Apply environment variable overrides.
    /// Pattern: `LGPD_DB_PATH`, `LGPD_SCHEDULER_WORKERS`, etc.
    fn apply_env_overrides(config: &mut LgpdConfig) {
        if let Ok(val) = std::env::var("LGPD_DB_PATH") {
            config.storage.db_path = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("LGPD_SCHEDULER_WORKERS") {
            if let Ok(v) = val.parse::<usize>() {
                config.scheduler.workers = Some(v);
            }
        }
        if let Ok(val) = std::env::var("LGPD_SCHEDULER_QUEUE_CAPACITY") {
            if let Ok(v) = val.parse::<usize>() {
                config.scheduler.queue_capacity = Some(v);
            }
        }
        if let Ok(val) = std::env::var("LGPD_JOB_TIMEOUT_SECS") {
            if let Ok(v) = val.parse::<u64>() {
                config.scheduler.job_timeout_secs = Some(v);
            }
        }
        if let Ok(val) = std::env::var("LGPD_DETECTION_GRANULARITY") {
            match val.to_ascii_lowercase().as_str() {
                "aggregate" => config.detection.granularity = Some(Granularity::Aggregate),
                "detailed" => config.detection.granularity = Some(Granularity::Detailed),
                other => tracing::warn!(value = other, "ignoring unknown LGPD_DETECTION_GRANULARITY"),
            }
        }
        if let Ok(val) = std::env::var("LGPD_REPORT_DIR") {
            config.report.output_dir = Some(PathBuf::from(val));
        }
    }

    /// Apply CLI overrides (highest priority).
    fn apply_cli_overrides(config: &mut LgpdConfig, cli: &CliOverrides) {
        if let Some(ref v) = cli.db_path {
            config.storage.db_path = Some(v.clone());
        }
        if let Some(v) = cli.workers {
            config.scheduler.workers = Some(v);
        }
        if let Some(ref v) = cli.report_dir {
            config.report.output_dir = Some(v.clone());
        }
        if let Some(v) = cli.granularity {
            config.detection.granularity = Some(v);
        }
    }

    /// Serialize the config back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            path: "<serialization>".to_string(),
            message: e.to_string(),
        })
    }
}

/// Cross-platform home directory resolution.
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
