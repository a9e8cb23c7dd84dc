//! PII categories and findings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// PII category detected by the pattern library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiCategory {
    Email,
    Phone,
    NationalId,
    CreditCard,
    Name,
}

impl PiiCategory {
    /// All categories in report order.
    pub const ALL: [PiiCategory; 5] = [
        PiiCategory::Email,
        PiiCategory::Phone,
        PiiCategory::NationalId,
        PiiCategory::CreditCard,
        PiiCategory::Name,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::NationalId => "national_id",
            Self::CreditCard => "credit_card",
            Self::Name => "name",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "email" => Some(Self::Email),
            "phone" => Some(Self::Phone),
            "national_id" | "nationalid" => Some(Self::NationalId),
            "credit_card" | "creditcard" => Some(Self::CreditCard),
            "name" => Some(Self::Name),
            _ => None,
        }
    }
}

impl fmt::Display for PiiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One detected PII occurrence or an aggregate of occurrences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub category: PiiCategory,
    /// `table.column` list (aggregate), `table.column#row` (detailed),
    /// or `(overflow)` for occurrences past the detail cap.
    pub location_hint: String,
    pub occurrence_count: u64,
}

impl Finding {
    pub fn new(category: PiiCategory, location_hint: impl Into<String>, occurrence_count: u64) -> Self {
        Self {
            category,
            location_hint: location_hint.into(),
            occurrence_count,
        }
    }
}

/// Sum occurrence counts per category, saturating.
pub fn totals_by_category(findings: &[Finding]) -> std::collections::BTreeMap<PiiCategory, u64> {
    let mut totals = std::collections::BTreeMap::new();
    for f in findings {
        let entry = totals.entry(f.category).or_insert(0u64);
        *entry = entry.saturating_add(f.occurrence_count);
    }
    totals
}
