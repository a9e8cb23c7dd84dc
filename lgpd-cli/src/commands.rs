//! Command implementations. Each writes its human-readable output to `out`.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use lgpd_core::config::LgpdConfig;
use lgpd_core::events::{JobEventHandler, JobProgressEvent};
use lgpd_core::models::{DriverKind, JobId, NewSourceConfig};
use lgpd_core::traits::{DeletePolicy, IJobStore, ISourceRegistry};
use lgpd_detect::{DetectionEngine, PatternLibrary};
use lgpd_report::JsonReportWriter;
use lgpd_scheduler::{JobControl, ScanService};
use lgpd_sources::ReaderRegistry;
use lgpd_storage::StorageEngine;

/// Arguments of `source add`.
#[derive(Debug, Clone)]
pub struct NewSourceArgs {
    pub name: String,
    pub driver: String,
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    pub password: String,
    pub database: String,
}

struct ProgressPrinter;

impl JobEventHandler for ProgressPrinter {
    fn on_job_progress(&self, event: &JobProgressEvent) {
        eprintln!(
            "job {}: {}% ({} rows)",
            event.job_id, event.progress, event.rows_scanned
        );
    }
}

/// Composition root: loaded config plus the opened job database.
pub struct App {
    config: LgpdConfig,
    store: Arc<StorageEngine>,
}

impl App {
    pub fn open(config: LgpdConfig) -> anyhow::Result<Self> {
        let store = StorageEngine::from_config(&config.storage).with_context(|| {
            format!(
                "opening job database {}",
                config.storage.effective_db_path().display()
            )
        })?;
        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    /// Cancel and report access; starts no workers, so jobs owned by another
    /// process are left to it.
    fn control(&self) -> JobControl {
        let writer = Arc::new(JsonReportWriter::from_config(&self.config.report));
        JobControl::new(self.store.clone(), writer)
    }

    /// Checkpoint the job database on exit. Failure only costs a longer WAL.
    pub fn close(self) {
        if let Err(e) = self.store.checkpoint() {
            tracing::warn!(error = %e, "job database checkpoint failed");
        }
    }

    fn service(&self, show_progress: bool) -> anyhow::Result<ScanService> {
        let library = PatternLibrary::from_config(&self.config.detection)?;
        let engine = DetectionEngine::new(Arc::new(library), &self.config.detection);
        let writer = Arc::new(JsonReportWriter::from_config(&self.config.report));

        let mut builder = ScanService::builder(self.store.clone(), self.store.clone(), writer)
            .readers(ReaderRegistry::with_defaults())
            .engine(Arc::new(engine))
            .requirements(self.config.compliance_requirements())
            .config(&self.config.scheduler);
        if show_progress {
            builder = builder.event_handler(Arc::new(ProgressPrinter));
        }
        Ok(builder.start()?)
    }

    pub fn add_source(&self, args: NewSourceArgs, out: &mut impl Write) -> anyhow::Result<()> {
        let Some(kind) = DriverKind::parse_str(&args.driver) else {
            bail!("unsupported driver '{}' (expected postgres, mysql or sqlite)", args.driver);
        };
        let config = self.store.register(&NewSourceConfig {
            name: args.name,
            host: args.host,
            port: args.port.unwrap_or_else(|| kind.default_port()),
            username: args.user,
            password: args.password,
            database_name: args.database,
            driver: kind.name().to_string(),
        })?;
        writeln!(out, "registered source {} ({})", config.name, config.id)?;
        Ok(())
    }

    pub fn list_sources(&self, out: &mut impl Write) -> anyhow::Result<()> {
        for source in self.store.list_sources()? {
            writeln!(out, "{}\t{}\t{}", source.id, source.name, source.target())?;
        }
        Ok(())
    }

    pub fn remove_source(
        &self,
        name: &str,
        policy: DeletePolicy,
        out: &mut impl Write,
    ) -> anyhow::Result<()> {
        let Some(source) = self.store.get_source_by_name(name)? else {
            bail!("no source named '{name}'");
        };
        self.store.delete_source(source.id, policy)?;
        writeln!(out, "removed source {name}")?;
        Ok(())
    }

    /// Submit a scan and block until it finishes.
    pub fn scan(&self, source_name: &str, verbose: bool, out: &mut impl Write) -> anyhow::Result<()> {
        let Some(source) = self.store.get_source_by_name(source_name)? else {
            bail!("no source named '{source_name}'");
        };
        let service = self.service(verbose)?;
        let job_id = service.submit(source.id)?;
        writeln!(out, "submitted job {job_id}")?;
        out.flush()?;

        let job = service.wait(job_id, Duration::MAX)?;
        service.shutdown();
        if verbose {
            writeln!(out, "{}", serde_json::to_string_pretty(&job)?)?;
        } else {
            writeln!(out, "job {job_id}: {}", job.state)?;
        }
        Ok(())
    }

    pub fn list_jobs(&self, out: &mut impl Write) -> anyhow::Result<()> {
        for job in self.store.list_jobs()? {
            writeln!(
                out,
                "{}\t{}\t{}\t{}%\t{}",
                job.id,
                job.source_config_id,
                job.state,
                job.progress_percent,
                job.created_at.to_rfc3339()
            )?;
        }
        Ok(())
    }

    pub fn show_job(&self, job_id: JobId, out: &mut impl Write) -> anyhow::Result<()> {
        let job = self.store.get_job(job_id)?;
        writeln!(out, "{}", serde_json::to_string_pretty(&job)?)?;
        Ok(())
    }

    pub fn cancel(&self, job_id: JobId, out: &mut impl Write) -> anyhow::Result<()> {
        let job = self.control().cancel(job_id)?;
        writeln!(out, "job {job_id}: {}", job.state)?;
        Ok(())
    }

    pub fn report(&self, job_id: JobId, path: Option<&Path>, out: &mut impl Write) -> anyhow::Result<()> {
        let mut report = self.control().fetch_report(job_id)?;
        match path {
            Some(path) => {
                let mut file = File::create(path)
                    .with_context(|| format!("creating {}", path.display()))?;
                io::copy(&mut report, &mut file)?;
                writeln!(out, "wrote {}", path.display())?;
            }
            None => {
                io::copy(&mut report, out)?;
            }
        }
        Ok(())
    }
}
