//! `lgpd`: operator CLI for PII scans.
//!
//! The process hosts the worker pool, so a submitted scan runs to a
//! terminal state before the command returns.

mod commands;

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lgpd_core::config::{CliOverrides, Granularity, LgpdConfig};
use lgpd_core::tracing::init_tracing;
use lgpd_core::JobId;
use lgpd_core::traits::DeletePolicy;

use crate::commands::{App, NewSourceArgs};

#[derive(Parser, Debug)]
#[command(name = "lgpd")]
#[command(about = "Scan databases for personal data and report LGPD compliance")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root holding lgpd.toml
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Job database path
    #[arg(long, global = true, env = "LGPD_DB_PATH")]
    db: Option<PathBuf>,

    /// Report output directory
    #[arg(long, global = true)]
    report_dir: Option<PathBuf>,

    /// Concurrent scan workers
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Finding granularity (aggregate, detailed)
    #[arg(long, global = true, value_parser = parse_granularity)]
    granularity: Option<Granularity>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage registered data sources
    Source {
        #[command(subcommand)]
        action: SourceCommand,
    },

    /// Scan a registered source
    Scan {
        /// Source name
        source: String,

        /// Print progress and the final job as JSON
        #[arg(long)]
        wait: bool,
    },

    /// List jobs, newest first
    Jobs,

    /// Show one job as JSON
    Job { id: i64 },

    /// Cancel a pending or running job
    Cancel { id: i64 },

    /// Fetch the report of a completed job
    Report {
        id: i64,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum SourceCommand {
    /// Register a source
    Add {
        name: String,

        /// postgres, mysql or sqlite
        #[arg(long)]
        driver: String,

        #[arg(long, default_value = "localhost")]
        host: String,

        /// Defaults to the driver's conventional port
        #[arg(long)]
        port: Option<u16>,

        #[arg(long, default_value = "")]
        user: String,

        #[arg(long, env = "LGPD_SOURCE_PASSWORD", default_value = "", hide_env_values = true)]
        password: String,

        /// Database name, or file path for sqlite
        #[arg(long)]
        database: String,
    },

    /// List registered sources
    List,

    /// Remove a source
    Remove {
        name: String,

        /// Also delete the source's jobs
        #[arg(long)]
        cascade: bool,
    },
}

fn parse_granularity(s: &str) -> Result<Granularity, String> {
    match s.to_ascii_lowercase().as_str() {
        "aggregate" => Ok(Granularity::Aggregate),
        "detailed" => Ok(Granularity::Detailed),
        other => Err(format!("unknown granularity '{other}' (expected aggregate or detailed)")),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let overrides = CliOverrides {
        db_path: cli.db,
        workers: cli.workers,
        report_dir: cli.report_dir,
        granularity: cli.granularity,
    };
    let config = LgpdConfig::load(&cli.root, Some(&overrides))?;
    let app = App::open(config)?;
    let mut out = io::stdout().lock();

    let result = match cli.command {
        Commands::Source { action } => match action {
            SourceCommand::Add {
                name,
                driver,
                host,
                port,
                user,
                password,
                database,
            } => app.add_source(
                NewSourceArgs {
                    name,
                    driver,
                    host,
                    port,
                    user,
                    password,
                    database,
                },
                &mut out,
            ),
            SourceCommand::List => app.list_sources(&mut out),
            SourceCommand::Remove { name, cascade } => {
                let policy = if cascade {
                    DeletePolicy::Cascade
                } else {
                    DeletePolicy::Restrict
                };
                app.remove_source(&name, policy, &mut out)
            }
        },
        Commands::Scan { source, wait } => app.scan(&source, wait, &mut out),
        Commands::Jobs => app.list_jobs(&mut out),
        Commands::Job { id } => app.show_job(JobId(id), &mut out),
        Commands::Cancel { id } => app.cancel(JobId(id), &mut out),
        Commands::Report { id, out: path } => app.report(JobId(id), path.as_deref(), &mut out),
    };
    app.close();
    result
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_scan_with_wait_and_globals() {
        let cli = Cli::try_parse_from([
            "lgpd",
            "scan",
            "crm",
            "--wait",
            "--granularity",
            "detailed",
            "--workers",
            "2",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Scan { ref source, wait: true } if source == "crm"));
        assert_eq!(cli.granularity, Some(Granularity::Detailed));
        assert_eq!(cli.workers, Some(2));
    }

    #[test]
    fn rejects_unknown_granularity() {
        let err = Cli::try_parse_from(["lgpd", "jobs", "--granularity", "verbose"]).unwrap_err();
        assert!(err.to_string().contains("unknown granularity"));
    }

    #[test]
    fn source_remove_defaults_to_restrict() {
        let cli = Cli::try_parse_from(["lgpd", "source", "remove", "crm"]).unwrap();
        match cli.command {
            Commands::Source {
                action: SourceCommand::Remove { name, cascade },
            } => {
                assert_eq!(name, "crm");
                assert!(!cascade);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
