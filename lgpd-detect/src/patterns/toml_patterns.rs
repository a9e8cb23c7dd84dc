//! Declarative TOML pattern definitions, appended to the built-in detectors.
//!
//! ```toml
//! [[patterns]]
//! id = "cnpj"
//! category = "national_id"
//! pattern = '\b\d{2}\.\d{3}\.\d{3}/\d{4}-\d{2}\b'
//! normalizer = "digits_only"
//! must_match = ["12.345.678/0001-95"]
//! must_not_match = ["12.345.678-9"]
//! ```

use std::path::Path;

use lgpd_core::errors::DetectionError;
use lgpd_core::PiiCategory;
use serde::{Deserialize, Serialize};

use super::{Normalizer, PatternDef, Validator};

/// A TOML-defined pattern definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlPatternDef {
    pub id: String,
    pub category: String,
    pub pattern: String,
    #[serde(default)]
    pub validator: Option<Validator>,
    #[serde(default)]
    pub normalizer: Normalizer,
    #[serde(default)]
    pub must_match: Vec<String>,
    #[serde(default)]
    pub must_not_match: Vec<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// A collection of TOML pattern definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlPatternFile {
    #[serde(default)]
    pub patterns: Vec<TomlPatternDef>,
}

/// Loader for TOML pattern definitions.
pub struct TomlPatternLoader;

impl TomlPatternLoader {
    /// Parse patterns from a TOML string. Compilation and self-tests happen
    /// later in `PatternLibrary::load`.
    pub fn load_from_str(toml_str: &str) -> Result<Vec<PatternDef>, DetectionError> {
        let file: TomlPatternFile = toml::from_str(toml_str)
            .map_err(|e| DetectionError::InvalidPattern(format!("TOML parse error: {e}")))?;

        file.patterns
            .into_iter()
            .filter(|def| def.enabled != Some(false))
            .map(Self::convert)
            .collect()
    }

    pub fn load_from_file(path: &Path) -> Result<Vec<PatternDef>, DetectionError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DetectionError::InvalidPattern(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::load_from_str(&content)
    }

    fn convert(def: TomlPatternDef) -> Result<PatternDef, DetectionError> {
        let category = PiiCategory::parse_str(&def.category).ok_or_else(|| {
            DetectionError::InvalidPattern(format!(
                "unknown category '{}' in pattern '{}'",
                def.category, def.id
            ))
        })?;

        Ok(PatternDef {
            id: def.id,
            category,
            pattern: def.pattern,
            validator: def.validator,
            normalizer: def.normalizer,
            must_match: def.must_match,
            must_not_match: def.must_not_match,
        })
    }
}
