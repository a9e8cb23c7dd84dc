//! Detection engine: folds a row stream into findings.

mod accumulator;

use std::sync::Arc;

use lgpd_core::config::{DetectionConfig, Granularity};
use lgpd_core::errors::{DetectionError, SourceError};
use lgpd_core::{Finding, Row};

use crate::patterns::PatternLibrary;

pub use accumulator::ScanAccumulator;

/// Shared, immutable detection engine. One per process.
#[derive(Debug, Clone)]
pub struct DetectionEngine {
    library: Arc<PatternLibrary>,
    granularity: Granularity,
    detail_cap: usize,
    max_cell_bytes: usize,
}

impl DetectionEngine {
    pub fn new(library: Arc<PatternLibrary>, config: &DetectionConfig) -> Self {
        Self {
            library,
            granularity: config.effective_granularity(),
            detail_cap: config.effective_detail_cap(),
            max_cell_bytes: config.effective_max_cell_bytes(),
        }
    }

    /// Built-in detectors with default settings.
    pub fn with_builtin() -> Result<Self, DetectionError> {
        Ok(Self::new(
            Arc::new(PatternLibrary::builtin()?),
            &DetectionConfig::default(),
        ))
    }

    pub fn with_granularity(mut self, granularity: Granularity, detail_cap: usize) -> Self {
        self.granularity = granularity;
        self.detail_cap = detail_cap;
        self
    }

    pub fn library(&self) -> &PatternLibrary {
        &self.library
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Fresh per-job accumulator.
    pub fn accumulator(&self) -> ScanAccumulator<'_> {
        ScanAccumulator::new(
            &self.library,
            self.granularity,
            self.detail_cap,
            self.max_cell_bytes,
        )
    }

    /// Scan a whole row stream. The first source or input error aborts
    /// the scan.
    pub fn scan<I>(&self, rows: I) -> Result<Vec<Finding>, DetectionError>
    where
        I: IntoIterator<Item = Result<Row, SourceError>>,
    {
        let mut acc = self.accumulator();
        for row in rows {
            acc.feed(&row?)?;
        }
        Ok(acc.finish())
    }
}
