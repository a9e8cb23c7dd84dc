//! Compliance requirement set used to frame reports.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Requirements checked by default, all assumed satisfied.
pub const DEFAULT_REQUIREMENTS: [&str; 6] = [
    "data_encryption",
    "consent_obtained",
    "data_minimization",
    "data_retention",
    "access_controls",
    "data_subject_rights",
];

/// Immutable mapping of requirement name to whether it is met.
///
/// Loaded once from configuration and passed explicitly to the report
/// writer. There is no process-wide instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComplianceRequirements {
    requirements: BTreeMap<String, bool>,
}

impl ComplianceRequirements {
    /// Defaults overridden by `overrides`.
    pub fn from_overrides(overrides: &BTreeMap<String, bool>) -> Self {
        let mut requirements: BTreeMap<String, bool> = DEFAULT_REQUIREMENTS
            .iter()
            .map(|name| (name.to_string(), true))
            .collect();
        requirements.extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));
        Self { requirements }
    }

    /// Compliant iff every requirement is met.
    pub fn verdict(&self) -> bool {
        self.requirements.values().all(|met| *met)
    }

    /// Requirement names that are not met.
    pub fn unmet(&self) -> Vec<&str> {
        self.requirements
            .iter()
            .filter(|(_, met)| !**met)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.requirements.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

impl Default for ComplianceRequirements {
    fn default() -> Self {
        Self::from_overrides(&BTreeMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_compliant() {
        let reqs = ComplianceRequirements::default();
        assert_eq!(reqs.len(), 6);
        assert!(reqs.verdict());
        assert!(reqs.unmet().is_empty());
    }

    #[test]
    fn one_unmet_requirement_flips_verdict() {
        let overrides = BTreeMap::from([("consent_obtained".to_string(), false)]);
        let reqs = ComplianceRequirements::from_overrides(&overrides);
        assert!(!reqs.verdict());
        assert_eq!(reqs.unmet(), vec!["consent_obtained"]);
    }
}
