use std::collections::{BTreeMap, BTreeSet};

use lgpd_core::config::Granularity;
use lgpd_core::errors::DetectionError;
use lgpd_core::{Finding, PiiCategory, Row};

use crate::patterns::PatternLibrary;

/// Distinct locations listed in an aggregate finding before the `(+N more)` tail.
pub const MAX_LISTED_LOCATIONS: usize = 8;

pub const OVERFLOW_HINT: &str = "(overflow)";

#[derive(Debug, Default)]
struct Tally {
    total: u64,
    locations: BTreeSet<String>,
    details: Vec<Finding>,
    overflow: u64,
}

/// Per-job incremental state. Feed rows in stream order, then `finish`.
#[derive(Debug)]
pub struct ScanAccumulator<'e> {
    library: &'e PatternLibrary,
    granularity: Granularity,
    detail_cap: usize,
    max_cell_bytes: usize,
    tallies: BTreeMap<PiiCategory, Tally>,
    bytes_scanned: u64,
}

impl<'e> ScanAccumulator<'e> {
    pub(crate) fn new(
        library: &'e PatternLibrary,
        granularity: Granularity,
        detail_cap: usize,
        max_cell_bytes: usize,
    ) -> Self {
        Self {
            library,
            granularity,
            detail_cap,
            max_cell_bytes,
            tallies: BTreeMap::new(),
            bytes_scanned: 0,
        }
    }

    /// Run every detector once over each non-null cell of `row`.
    pub fn feed(&mut self, row: &Row) -> Result<(), DetectionError> {
        for cell in &row.cells {
            let Some(text) = cell.value.as_deref() else {
                continue;
            };
            if text.len() > self.max_cell_bytes {
                return Err(DetectionError::MalformedInput {
                    location: format!("{}#{}", row.location(&cell.column), row.row_index),
                    message: format!(
                        "cell of {} bytes exceeds the {} byte limit",
                        text.len(),
                        self.max_cell_bytes
                    ),
                });
            }
            self.bytes_scanned = self.bytes_scanned.saturating_add(text.len() as u64);

            let matches = self.library.find_all(text);
            if matches.is_empty() {
                continue;
            }
            let location = row.location(&cell.column);
            for m in matches {
                let tally = self.tallies.entry(m.category).or_default();
                tally.total = tally.total.saturating_add(1);
                match self.granularity {
                    Granularity::Aggregate => {
                        if !tally.locations.contains(&location) {
                            tally.locations.insert(location.clone());
                        }
                    }
                    Granularity::Detailed => {
                        if tally.details.len() < self.detail_cap {
                            tally.details.push(Finding::new(
                                m.category,
                                format!("{location}#{}", row.row_index),
                                1,
                            ));
                        } else {
                            tally.overflow = tally.overflow.saturating_add(1);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Bytes of non-null cell text fed so far.
    pub fn bytes_scanned(&self) -> u64 {
        self.bytes_scanned
    }

    /// Findings in category order. Detailed entries keep stream order and
    /// are followed by the category's overflow entry, if any.
    pub fn finish(self) -> Vec<Finding> {
        let mut findings = Vec::new();
        for (category, tally) in self.tallies {
            if tally.total == 0 {
                continue;
            }
            match self.granularity {
                Granularity::Aggregate => {
                    findings.push(Finding::new(
                        category,
                        location_summary(&tally.locations),
                        tally.total,
                    ));
                }
                Granularity::Detailed => {
                    findings.extend(tally.details);
                    if tally.overflow > 0 {
                        findings.push(Finding::new(category, OVERFLOW_HINT, tally.overflow));
                    }
                }
            }
        }
        findings
    }
}

fn location_summary(locations: &BTreeSet<String>) -> String {
    let mut hint = locations
        .iter()
        .take(MAX_LISTED_LOCATIONS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if locations.len() > MAX_LISTED_LOCATIONS {
        hint.push_str(&format!(" (+{} more)", locations.len() - MAX_LISTED_LOCATIONS));
    }
    hint
}
