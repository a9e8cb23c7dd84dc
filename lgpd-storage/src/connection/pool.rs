//! Read-only connections serving job polls and listings.
//!
//! `ScanService::wait` polls a job every few milliseconds while CLI
//! listings may hold a connection for a full table read, so a checkout
//! prefers any idle connection and only queues behind a busy one when the
//! whole pool is in use.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, TryLockError};

use lgpd_core::errors::StorageError;
use rusqlite::{Connection, OpenFlags};

use super::pragmas::apply_read_pragmas;

/// Upper bound on pooled readers regardless of configuration.
pub const MAX_READERS: usize = 8;

pub struct ReadPool {
    slots: Vec<Mutex<Connection>>,
    rotation: AtomicUsize,
}

fn open_reader(path: &Path) -> Result<Connection, StorageError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| StorageError::SqliteError {
        message: format!("failed to open reader on {}: {e}", path.display()),
    })?;
    apply_read_pragmas(&conn)?;
    Ok(conn)
}

impl ReadPool {
    /// Open `size` readers on an existing, migrated database file.
    pub fn open(path: &Path, size: usize) -> Result<Self, StorageError> {
        let slots = (0..size.clamp(1, MAX_READERS))
            .map(|_| open_reader(path).map(Mutex::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            slots,
            rotation: AtomicUsize::new(0),
        })
    }

    /// Run `f` on an idle reader, or wait for the next one in rotation.
    /// Readers are query-only, so a poisoned slot is still safe to reuse.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        let start = self.rotation.fetch_add(1, Ordering::Relaxed);
        let len = self.slots.len();
        for offset in 0..len {
            match self.slots[(start + offset) % len].try_lock() {
                Ok(guard) => return f(&guard),
                Err(TryLockError::Poisoned(poisoned)) => return f(&poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => {}
            }
        }
        let guard = self.slots[start % len]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn database(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("jobs.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("PRAGMA journal_mode = WAL; CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (7);")
            .unwrap();
        path
    }

    #[test]
    fn size_is_clamped() {
        let dir = TempDir::new().unwrap();
        let path = database(&dir);
        assert_eq!(ReadPool::open(&path, 0).unwrap().size(), 1);
        assert_eq!(ReadPool::open(&path, 64).unwrap().size(), MAX_READERS);
    }

    #[test]
    fn nested_checkout_takes_another_idle_reader() {
        let dir = TempDir::new().unwrap();
        let pool = ReadPool::open(&database(&dir), 2).unwrap();
        let total = pool
            .with_conn(|outer| {
                let a: i64 = outer.query_row("SELECT x FROM t", [], |r| r.get(0)).unwrap();
                let b = pool.with_conn(|inner| {
                    Ok(inner.query_row("SELECT x FROM t", [], |r| r.get::<_, i64>(0)).unwrap())
                })?;
                Ok(a + b)
            })
            .unwrap();
        assert_eq!(total, 14);
    }

    #[test]
    fn readers_refuse_writes() {
        let dir = TempDir::new().unwrap();
        let pool = ReadPool::open(&database(&dir), 1).unwrap();
        let refused = pool
            .with_conn(|conn| Ok(conn.execute("INSERT INTO t VALUES (1)", []).is_err()))
            .unwrap();
        assert!(refused);
    }
}
