//! Connection management for the job database.
//!
//! Every job transition goes through one serialized writer so the CAS in
//! `queries::scan_jobs` sees a consistent row. Reads go to a pool of
//! query-only connections when the database is a file; an in-memory
//! database has nothing for a second connection to open, so its reads share
//! the writer.

pub mod pool;
pub mod pragmas;
pub mod writer;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use lgpd_core::config::StorageConfig;
use lgpd_core::errors::StorageError;
use rusqlite::Connection;

use self::pool::ReadPool;
use self::pragmas::apply_pragmas;
use crate::migrations;

pub struct DatabaseManager {
    writer: Mutex<Connection>,
    readers: Option<ReadPool>,
    path: Option<PathBuf>,
}

fn sqlite_err(e: rusqlite::Error) -> StorageError {
    StorageError::SqliteError {
        message: e.to_string(),
    }
}

fn prepare_writer(conn: Connection) -> Result<Connection, StorageError> {
    apply_pragmas(&conn)?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}

impl DatabaseManager {
    /// Open (or create) the job database at `path` with `read_pool_size`
    /// readers. The writer migrates the schema before any reader opens.
    pub fn open(path: &Path, read_pool_size: usize) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::SqliteError {
                message: format!("failed to create {}: {e}", parent.display()),
            })?;
        }
        let writer = prepare_writer(Connection::open(path).map_err(sqlite_err)?)?;
        let readers = ReadPool::open(path, read_pool_size)?;
        Ok(Self {
            writer: Mutex::new(writer),
            readers: Some(readers),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        Self::open(&config.effective_db_path(), config.effective_read_pool_size())
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let writer = prepare_writer(Connection::open_in_memory().map_err(sqlite_err)?)?;
        Ok(Self {
            writer: Mutex::new(writer),
            readers: None,
            path: None,
        })
    }

    /// Run `f` on the serialized writer connection.
    pub fn with_writer<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        let guard = self.writer.lock().map_err(|_| StorageError::SqliteError {
            message: "write lock poisoned".to_string(),
        })?;
        f(&guard)
    }

    /// Run `f` on a pooled reader, or on the writer when there is no pool.
    pub fn with_reader<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        match &self.readers {
            Some(pool) => pool.with_conn(f),
            None => self.with_writer(f),
        }
    }

    /// Move committed WAL frames into the database file and truncate the
    /// log. Returns the number of frames checkpointed; zero in memory.
    pub fn checkpoint(&self) -> Result<u64, StorageError> {
        if self.path.is_none() {
            return Ok(0);
        }
        self.with_writer(|conn| {
            let (busy, frames): (i64, i64) = conn
                .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |row| {
                    Ok((row.get(0)?, row.get(2)?))
                })
                .map_err(sqlite_err)?;
            if busy != 0 {
                tracing::debug!("wal checkpoint incomplete, a reader is still active");
            }
            Ok(frames.max(0) as u64)
        })
    }

    /// Database file path (None for in-memory).
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Pooled readers; zero when reads share the writer.
    pub fn read_pool_size(&self) -> usize {
        self.readers.as_ref().map_or(0, ReadPool::size)
    }
}
