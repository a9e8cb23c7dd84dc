//! StorageEngine: owns the DatabaseManager, implements IJobStore +
//! ISourceRegistry.

use std::path::Path;

use chrono::Utc;
use lgpd_core::config::StorageConfig;
use lgpd_core::errors::StorageError;
use lgpd_core::models::{
    JobId, JobState, NewSourceConfig, ScanJob, SourceConfig, TransitionPayload,
};
use lgpd_core::traits::{DeletePolicy, IJobStore, ISourceRegistry};
use rusqlite::Connection;

use crate::connection::writer::with_immediate_transaction;
use crate::connection::DatabaseManager;
use crate::queries::{scan_jobs, source_configs};

/// The job store and source-config registry over one SQLite database.
pub struct StorageEngine {
    db: DatabaseManager,
}

impl StorageEngine {
    pub fn open(path: &Path, read_pool_size: usize) -> Result<Self, StorageError> {
        let db = DatabaseManager::open(path, read_pool_size)?;
        tracing::debug!(path = %path.display(), readers = db.read_pool_size(), "storage opened");
        Ok(Self { db })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let db = DatabaseManager::from_config(config)?;
        tracing::debug!(
            path = %config.effective_db_path().display(),
            readers = db.read_pool_size(),
            "storage opened"
        );
        Ok(Self { db })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Ok(Self {
            db: DatabaseManager::open_in_memory()?,
        })
    }

    pub fn db(&self) -> &DatabaseManager {
        &self.db
    }

    /// Fold the WAL into the database file before the process exits.
    pub fn checkpoint(&self) -> Result<(), StorageError> {
        let frames = self.db.checkpoint()?;
        tracing::debug!(frames, "job database checkpointed");
        Ok(())
    }

    fn with_reader<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        self.db.with_reader(f)
    }
}

impl IJobStore for StorageEngine {
    fn create_job(&self, source_config_id: i64) -> Result<ScanJob, StorageError> {
        self.db.with_writer(|conn| {
            with_immediate_transaction(conn, |tx| {
                if source_configs::get(tx, source_config_id)?.is_none() {
                    return Err(StorageError::NotFound {
                        entity: "source config",
                        id: source_config_id,
                    });
                }
                let id = scan_jobs::insert_pending(tx, source_config_id, Utc::now())?;
                scan_jobs::get(tx, id)?.ok_or(StorageError::NotFound {
                    entity: "scan job",
                    id: id.0,
                })
            })
        })
    }

    fn transition(
        &self,
        job_id: JobId,
        expected: &JobState,
        next: JobState,
        payload: TransitionPayload,
    ) -> Result<ScanJob, StorageError> {
        if !expected.can_transition_to(&next) {
            return Err(StorageError::InvalidTransition {
                job_id: job_id.0,
                from: expected.to_string(),
                to: next.to_string(),
            });
        }

        self.db.with_writer(|conn| {
            let changed =
                scan_jobs::compare_and_set(conn, job_id, expected, &next, &payload, Utc::now())?;
            let current = scan_jobs::get(conn, job_id)?.ok_or(StorageError::NotFound {
                entity: "scan job",
                id: job_id.0,
            })?;
            if changed == 0 {
                return Err(StorageError::StaleState {
                    job_id: job_id.0,
                    expected: expected.to_string(),
                    actual: current.state.to_string(),
                });
            }
            tracing::trace!(job_id = job_id.0, from = %expected, to = %next, "transition committed");
            Ok(current)
        })
    }

    fn get_job(&self, job_id: JobId) -> Result<ScanJob, StorageError> {
        self.with_reader(|conn| scan_jobs::get(conn, job_id))?
            .ok_or(StorageError::NotFound {
                entity: "scan job",
                id: job_id.0,
            })
    }

    fn list_jobs(&self) -> Result<Vec<ScanJob>, StorageError> {
        self.with_reader(scan_jobs::list)
    }

    fn list_orphaned(&self) -> Result<Vec<ScanJob>, StorageError> {
        self.with_reader(scan_jobs::list_unfinished)
    }

    fn count_jobs(&self) -> Result<i64, StorageError> {
        self.with_reader(scan_jobs::count)
    }
}

impl ISourceRegistry for StorageEngine {
    fn register(&self, config: &NewSourceConfig) -> Result<SourceConfig, StorageError> {
        let created = self
            .db
            .with_writer(|conn| source_configs::insert(conn, config, Utc::now()))?;
        tracing::info!(id = created.id, name = %created.name, driver = %created.driver, "source registered");
        Ok(created)
    }

    fn get_source(&self, id: i64) -> Result<SourceConfig, StorageError> {
        self.with_reader(|conn| source_configs::get(conn, id))?
            .ok_or(StorageError::NotFound {
                entity: "source config",
                id,
            })
    }

    fn get_source_by_name(&self, name: &str) -> Result<Option<SourceConfig>, StorageError> {
        self.with_reader(|conn| source_configs::get_by_name(conn, name))
    }

    fn list_sources(&self) -> Result<Vec<SourceConfig>, StorageError> {
        self.with_reader(source_configs::list)
    }

    fn update_source(&self, config: &SourceConfig) -> Result<(), StorageError> {
        let changed = self
            .db
            .with_writer(|conn| source_configs::update(conn, config))?;
        if changed == 0 {
            return Err(StorageError::NotFound {
                entity: "source config",
                id: config.id,
            });
        }
        Ok(())
    }

    fn delete_source(&self, id: i64, policy: DeletePolicy) -> Result<(), StorageError> {
        self.db.with_writer(|conn| {
            with_immediate_transaction(conn, |tx| {
                if source_configs::get(tx, id)?.is_none() {
                    return Err(StorageError::NotFound {
                        entity: "source config",
                        id,
                    });
                }
                let job_count = scan_jobs::count_for_source(tx, id)?;
                match policy {
                    DeletePolicy::Restrict if job_count > 0 => {
                        return Err(StorageError::ConfigInUse { id, job_count });
                    }
                    DeletePolicy::Cascade if job_count > 0 => {
                        let removed = scan_jobs::delete_for_source(tx, id)?;
                        tracing::info!(source_config_id = id, removed, "cascaded job deletion");
                    }
                    _ => {}
                }
                source_configs::delete(tx, id)?;
                Ok(())
            })
        })
    }
}
