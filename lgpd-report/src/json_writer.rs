//! File-backed JSON report writer.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use lgpd_core::config::{ComplianceRequirements, ReportConfig};
use lgpd_core::errors::WriteError;
use lgpd_core::traits::ReportWriter;
use lgpd_core::Finding;

use crate::document::ComplianceReport;

/// Writes `compliance_report_<timestamp>_<id>.json` files into one directory.
#[derive(Debug, Clone)]
pub struct JsonReportWriter {
    output_dir: PathBuf,
}

impl JsonReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(config.effective_output_dir())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Read a written report back into its document form.
    pub fn read_report(&self, artifact_ref: &str) -> Result<ComplianceReport, WriteError> {
        let mut json = String::new();
        let path = self.resolve(artifact_ref)?;
        self.open(artifact_ref)?
            .read_to_string(&mut json)
            .map_err(|source| WriteError::Io { path, source })?;
        serde_json::from_str(&json).map_err(|e| WriteError::Serialization {
            message: e.to_string(),
        })
    }

    /// Artifact references are bare file names inside the output directory.
    fn resolve(&self, artifact_ref: &str) -> Result<PathBuf, WriteError> {
        let name = Path::new(artifact_ref);
        let is_bare = name.components().count() == 1
            && name.file_name().map(|f| f == name.as_os_str()).unwrap_or(false);
        if artifact_ref.is_empty() || !is_bare {
            return Err(WriteError::ArtifactMissing {
                artifact: artifact_ref.to_string(),
            });
        }
        Ok(self.output_dir.join(name))
    }

    fn artifact_name() -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!(
            "compliance_report_{}_{}.json",
            Utc::now().format("%Y%m%d_%H%M%S"),
            &id[..8]
        )
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> WriteError {
    let path = path.to_path_buf();
    move |source| WriteError::Io { path, source }
}

impl ReportWriter for JsonReportWriter {
    fn write(
        &self,
        findings: &[Finding],
        requirements: &ComplianceRequirements,
    ) -> Result<String, WriteError> {
        fs::create_dir_all(&self.output_dir).map_err(io_err(&self.output_dir))?;

        let report = ComplianceReport::new(findings, requirements);
        let name = Self::artifact_name();
        let final_path = self.output_dir.join(&name);
        let tmp_path = self.output_dir.join(format!(".{name}.tmp"));

        let file = File::create(&tmp_path).map_err(io_err(&tmp_path))?;
        let mut out = BufWriter::new(file);
        let written = serde_json::to_writer_pretty(&mut out, &report)
            .map_err(|e| WriteError::Serialization {
                message: e.to_string(),
            })
            .and_then(|()| out.flush().map_err(io_err(&tmp_path)))
            .and_then(|()| out.get_ref().sync_all().map_err(io_err(&tmp_path)));
        drop(out);
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        fs::rename(&tmp_path, &final_path).map_err(io_err(&final_path))?;

        tracing::info!(
            artifact = %name,
            findings = findings.len(),
            compliant = report.is_compliant(),
            "compliance report written"
        );
        Ok(name)
    }

    fn open(&self, artifact_ref: &str) -> Result<Box<dyn Read + Send>, WriteError> {
        let path = self.resolve(artifact_ref)?;
        match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(WriteError::ArtifactMissing {
                artifact: artifact_ref.to_string(),
            }),
            Err(source) => Err(WriteError::Io { path, source }),
        }
    }
}
