//! Report writer configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory report artifacts are written to. Default: `reports`.
    pub output_dir: Option<PathBuf>,
}

impl ReportConfig {
    pub fn effective_output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("reports"))
    }
}
