//! Storage contracts: the job store and the source-config registry.

use crate::errors::StorageError;
use crate::models::{JobId, JobState, NewSourceConfig, ScanJob, SourceConfig, TransitionPayload};

/// Durable record of scan jobs with compare-and-set transitions.
pub trait IJobStore: Send + Sync {
    /// Create a job in `Pending`.
    fn create_job(&self, source_config_id: i64) -> Result<ScanJob, StorageError>;

    /// Move a job from `expected` to `next` atomically, writing `payload`
    /// in the same statement. Fails with `StaleState` when the stored state
    /// (including progress) is not `expected`, and with `InvalidTransition`
    /// when the edge is not part of the lifecycle.
    fn transition(
        &self,
        job_id: JobId,
        expected: &JobState,
        next: JobState,
        payload: TransitionPayload,
    ) -> Result<ScanJob, StorageError>;

    fn get_job(&self, job_id: JobId) -> Result<ScanJob, StorageError>;

    /// All jobs, newest first.
    fn list_jobs(&self) -> Result<Vec<ScanJob>, StorageError>;

    /// Jobs left `Pending`/`InProgress`, e.g. by a crash.
    fn list_orphaned(&self) -> Result<Vec<ScanJob>, StorageError>;

    fn count_jobs(&self) -> Result<i64, StorageError>;
}

/// How to treat jobs that reference a config being deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Refuse while any job references the config.
    Restrict,
    /// Delete referencing jobs first.
    Cascade,
}

/// CRUD over registered source configs.
pub trait ISourceRegistry: Send + Sync {
    fn register(&self, config: &NewSourceConfig) -> Result<SourceConfig, StorageError>;
    fn get_source(&self, id: i64) -> Result<SourceConfig, StorageError>;
    fn get_source_by_name(&self, name: &str) -> Result<Option<SourceConfig>, StorageError>;
    fn list_sources(&self) -> Result<Vec<SourceConfig>, StorageError>;
    fn update_source(&self, config: &SourceConfig) -> Result<(), StorageError>;
    fn delete_source(&self, id: i64, policy: DeletePolicy) -> Result<(), StorageError>;
}
