use std::collections::BTreeMap;
use std::io::Read;

use lgpd_core::config::ComplianceRequirements;
use lgpd_core::errors::WriteError;
use lgpd_core::models::totals_by_category;
use lgpd_core::traits::ReportWriter;
use lgpd_core::{Finding, PiiCategory};
use lgpd_report::document::Verdict;
use lgpd_report::JsonReportWriter;
use tempfile::TempDir;

fn findings() -> Vec<Finding> {
    vec![
        Finding::new(PiiCategory::Email, "customers.email, leads.contact", 12),
        Finding::new(PiiCategory::CreditCard, "payments.card", 3),
        Finding::new(PiiCategory::Name, "customers.name", 40),
    ]
}

#[test]
fn round_trip_preserves_categories_and_counts() {
    let dir = TempDir::new().unwrap();
    let writer = JsonReportWriter::new(dir.path().join("reports"));

    let artifact = writer
        .write(&findings(), &ComplianceRequirements::default())
        .unwrap();
    assert!(artifact.starts_with("compliance_report_"));
    assert!(artifact.ends_with(".json"));
    assert!(dir.path().join("reports").join(&artifact).is_file());

    let report = writer.read_report(&artifact).unwrap();
    assert_eq!(report.findings, findings());
    assert_eq!(report.totals, totals_by_category(&findings()));
    assert_eq!(report.verdict, Verdict::Compliant);
    assert!(report.unmet_requirements.is_empty());
}

#[test]
fn verdict_follows_the_requirements_passed_in() {
    let dir = TempDir::new().unwrap();
    let writer = JsonReportWriter::new(dir.path());
    let requirements = ComplianceRequirements::from_overrides(&BTreeMap::from([(
        "data_encryption".to_string(),
        false,
    )]));

    let artifact = writer.write(&findings(), &requirements).unwrap();
    let mut raw = String::new();
    writer.open(&artifact).unwrap().read_to_string(&mut raw).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["verdict"], "non_compliant");
    assert_eq!(json["unmet_requirements"][0], "data_encryption");
    assert_eq!(json["requirements"]["data_encryption"], false);
}

#[test]
fn no_temp_files_are_left_behind() {
    let dir = TempDir::new().unwrap();
    let writer = JsonReportWriter::new(dir.path());
    writer.write(&[], &ComplianceRequirements::default()).unwrap();
    writer.write(&findings(), &ComplianceRequirements::default()).unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.iter().all(|n| !n.ends_with(".tmp")));
}

#[test]
fn unknown_or_escaping_artifacts_are_missing() {
    let dir = TempDir::new().unwrap();
    let writer = JsonReportWriter::new(dir.path());
    for artifact in ["nope.json", "../etc/passwd", "/etc/passwd", ""] {
        assert!(
            matches!(writer.open(artifact), Err(WriteError::ArtifactMissing { .. })),
            "{artifact}"
        );
    }
}

#[test]
fn unwritable_directory_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, b"file").unwrap();
    let writer = JsonReportWriter::new(blocker.join("reports"));
    assert!(matches!(
        writer.write(&findings(), &ComplianceRequirements::default()),
        Err(WriteError::Io { .. })
    ));
}
