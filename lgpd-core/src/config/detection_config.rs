//! Detection engine configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How findings are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One finding per category with a total count. Bounded memory.
    #[default]
    Aggregate,
    /// One finding per occurrence up to a per-category cap, then an
    /// overflow aggregate.
    Detailed,
}

/// Configuration for the pattern library and detection engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DetectionConfig {
    /// Default: aggregate.
    pub granularity: Option<Granularity>,
    /// Per-category occurrence cap in detailed mode. Default: 100.
    pub detail_cap: Option<usize>,
    /// Extra TOML pattern files appended to the built-in detectors.
    #[serde(default)]
    pub pattern_files: Vec<PathBuf>,
    /// Built-in detector ids to leave out (e.g. `name`).
    #[serde(default)]
    pub disabled_detectors: Vec<String>,
    /// Cells larger than this are rejected as malformed input. Default: 16 MiB.
    pub max_cell_bytes: Option<usize>,
}

impl DetectionConfig {
    pub fn effective_granularity(&self) -> Granularity {
        self.granularity.unwrap_or_default()
    }

    pub fn effective_detail_cap(&self) -> usize {
        self.detail_cap.unwrap_or(100)
    }

    pub fn effective_max_cell_bytes(&self) -> usize {
        self.max_cell_bytes.unwrap_or(16 * 1024 * 1024)
    }
}
