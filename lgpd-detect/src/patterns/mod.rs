//! Pattern library: detector definitions, compilation, and load-time self-tests.

pub mod builtin;
pub mod checksum;
pub mod toml_patterns;

use std::collections::HashSet;

use lgpd_core::config::DetectionConfig;
use lgpd_core::errors::DetectionError;
use lgpd_core::PiiCategory;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use toml_patterns::TomlPatternLoader;

/// Post-match validator applied to the matched text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Validator {
    Luhn,
    Cpf,
}

impl Validator {
    pub fn accepts(&self, matched: &str) -> bool {
        match self {
            Self::Luhn => checksum::luhn_valid(matched),
            Self::Cpf => checksum::cpf_valid(matched),
        }
    }
}

/// How the matched text is normalized into `PiiMatch::normalized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Normalizer {
    #[default]
    Verbatim,
    Lowercase,
    DigitsOnly,
    CollapseWhitespace,
}

impl Normalizer {
    pub fn apply(&self, matched: &str) -> String {
        match self {
            Self::Verbatim => matched.to_string(),
            Self::Lowercase => matched.to_lowercase(),
            Self::DigitsOnly => matched.chars().filter(char::is_ascii_digit).collect(),
            Self::CollapseWhitespace => matched.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

/// An uncompiled detector definition.
#[derive(Debug, Clone)]
pub struct PatternDef {
    pub id: String,
    pub category: PiiCategory,
    pub pattern: String,
    pub validator: Option<Validator>,
    pub normalizer: Normalizer,
    pub must_match: Vec<String>,
    pub must_not_match: Vec<String>,
}

/// A single match produced by a detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiiMatch {
    pub category: PiiCategory,
    /// Id of the detector that produced the match.
    pub detector: String,
    pub start: usize,
    pub end: usize,
    pub normalized: String,
}

impl PiiMatch {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    fn overlaps(&self, other: &PiiMatch) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A compiled, self-tested detector.
#[derive(Debug, Clone)]
pub struct Detector {
    id: String,
    category: PiiCategory,
    regex: Regex,
    validator: Option<Validator>,
    normalizer: Normalizer,
}

impl Detector {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> PiiCategory {
        self.category
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// All validated matches in `text`, left to right.
    pub fn find(&self, text: &str) -> Vec<PiiMatch> {
        let mut out = Vec::new();
        self.find_into(text, &mut out);
        out
    }

    fn find_into(&self, text: &str, out: &mut Vec<PiiMatch>) {
        for m in self.regex.find_iter(text) {
            if m.is_empty() {
                continue;
            }
            let matched = m.as_str();
            if let Some(validator) = self.validator {
                if !validator.accepts(matched) {
                    continue;
                }
            }
            out.push(PiiMatch {
                category: self.category,
                detector: self.id.clone(),
                start: m.start(),
                end: m.end(),
                normalized: self.normalizer.apply(matched),
            });
        }
    }

    fn compile(def: PatternDef) -> Result<Self, DetectionError> {
        if def.id.trim().is_empty() {
            return Err(DetectionError::InvalidPattern(
                "pattern id must not be empty".to_string(),
            ));
        }
        if def.pattern.is_empty() {
            return Err(DetectionError::InvalidPattern(format!(
                "pattern '{}' has an empty expression",
                def.id
            )));
        }
        let regex = Regex::new(&def.pattern).map_err(|e| DetectionError::CompilationFailed {
            id: def.id.clone(),
            message: e.to_string(),
        })?;
        if regex.is_match("") {
            return Err(DetectionError::InvalidPattern(format!(
                "pattern '{}' matches the empty string",
                def.id
            )));
        }

        let detector = Self {
            id: def.id,
            category: def.category,
            regex,
            validator: def.validator,
            normalizer: def.normalizer,
        };
        detector.self_test(&def.must_match, &def.must_not_match)?;
        Ok(detector)
    }

    fn self_test(&self, must_match: &[String], must_not_match: &[String]) -> Result<(), DetectionError> {
        if must_match.is_empty() {
            return Err(DetectionError::SelfTestFailed {
                id: self.id.clone(),
                message: "no must_match samples".to_string(),
            });
        }
        for sample in must_match {
            if self.find(sample).is_empty() {
                return Err(DetectionError::SelfTestFailed {
                    id: self.id.clone(),
                    message: format!("expected a match in {sample:?}"),
                });
            }
        }
        for sample in must_not_match {
            if let Some(m) = self.find(sample).first() {
                return Err(DetectionError::SelfTestFailed {
                    id: self.id.clone(),
                    message: format!(
                        "unexpected match {:?} in {sample:?}",
                        &sample[m.start..m.end]
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Ordered, immutable set of detectors shared by every job.
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    detectors: Vec<Detector>,
}

impl PatternLibrary {
    /// Compile and self-test every definition. Any failure rejects the
    /// whole library.
    pub fn load(defs: Vec<PatternDef>) -> Result<Self, DetectionError> {
        let mut seen = HashSet::new();
        let mut detectors = Vec::with_capacity(defs.len());
        for def in defs {
            if !seen.insert(def.id.clone()) {
                return Err(DetectionError::InvalidPattern(format!(
                    "duplicate pattern id '{}'",
                    def.id
                )));
            }
            detectors.push(Detector::compile(def)?);
        }
        tracing::debug!(count = detectors.len(), "pattern library loaded");
        Ok(Self { detectors })
    }

    /// The built-in Brazilian detectors.
    pub fn builtin() -> Result<Self, DetectionError> {
        Self::load(builtin::definitions())
    }

    /// Built-ins minus `disabled_detectors`, followed by every TOML pattern file.
    pub fn from_config(config: &DetectionConfig) -> Result<Self, DetectionError> {
        let mut defs: Vec<PatternDef> = builtin::definitions()
            .into_iter()
            .filter(|d| !config.disabled_detectors.iter().any(|id| id == &d.id))
            .collect();
        for path in &config.pattern_files {
            let extra = TomlPatternLoader::load_from_file(path)?;
            tracing::info!(path = %path.display(), count = extra.len(), "loaded pattern file");
            defs.extend(extra);
        }
        Self::load(defs)
    }

    pub fn detectors(&self) -> &[Detector] {
        &self.detectors
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Run every detector once over `text` and apply the overlap policy:
    /// matches of different categories are all kept, overlapping matches
    /// within one category keep the longer span, then the earlier detector.
    ///
    /// The result is ordered by start offset, then category.
    pub fn find_all(&self, text: &str) -> Vec<PiiMatch> {
        if text.is_empty() {
            return Vec::new();
        }
        let mut ranked: Vec<(usize, PiiMatch)> = Vec::new();
        for (rank, detector) in self.detectors.iter().enumerate() {
            let mut found = Vec::new();
            detector.find_into(text, &mut found);
            ranked.extend(found.into_iter().map(|m| (rank, m)));
        }
        if ranked.len() < 2 {
            return ranked.into_iter().map(|(_, m)| m).collect();
        }

        // Best candidates first within each category.
        ranked.sort_by(|(ra, a), (rb, b)| {
            a.category
                .cmp(&b.category)
                .then(b.len().cmp(&a.len()))
                .then(ra.cmp(rb))
                .then(a.start.cmp(&b.start))
        });

        let mut kept: Vec<PiiMatch> = Vec::with_capacity(ranked.len());
        for (_, candidate) in ranked {
            let clashes = kept
                .iter()
                .rev()
                .take_while(|k| k.category == candidate.category)
                .any(|k| k.overlaps(&candidate));
            if !clashes {
                kept.push(candidate);
            }
        }
        kept.sort_by(|a, b| a.start.cmp(&b.start).then(a.category.cmp(&b.category)));
        kept
    }
}
