//! The persisted report document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use lgpd_core::config::ComplianceRequirements;
use lgpd_core::models::totals_by_category;
use lgpd_core::{Finding, PiiCategory};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Compliant,
    NonCompliant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub generated_at: DateTime<Utc>,
    pub verdict: Verdict,
    pub requirements: ComplianceRequirements,
    pub unmet_requirements: Vec<String>,
    pub totals: BTreeMap<PiiCategory, u64>,
    pub findings: Vec<Finding>,
}

impl ComplianceReport {
    pub fn new(findings: &[Finding], requirements: &ComplianceRequirements) -> Self {
        let verdict = if requirements.verdict() {
            Verdict::Compliant
        } else {
            Verdict::NonCompliant
        };
        Self {
            generated_at: Utc::now(),
            verdict,
            requirements: requirements.clone(),
            unmet_requirements: requirements.unmet().into_iter().map(str::to_string).collect(),
            totals: totals_by_category(findings),
            findings: findings.to_vec(),
        }
    }

    pub fn is_compliant(&self) -> bool {
        self.verdict == Verdict::Compliant
    }
}
