//! Schema migrations using PRAGMA user_version.

pub mod v001_initial;

use lgpd_core::errors::StorageError;
use rusqlite::Connection;

const MIGRATIONS: &[(&str, u32)] = &[(v001_initial::MIGRATION_SQL, 1)];

/// Apply every migration newer than the stored `user_version`.
pub fn run_migrations(conn: &Connection) -> Result<(), StorageError> {
    let current_version = current_version(conn).map_err(|e| StorageError::MigrationFailed {
        version: 0,
        message: e.to_string(),
    })?;

    for (sql, version) in MIGRATIONS {
        if current_version >= *version {
            continue;
        }
        conn.execute_batch(sql).map_err(|e| StorageError::MigrationFailed {
            version: *version,
            message: e.to_string(),
        })?;
        conn.pragma_update(None, "user_version", version)
            .map_err(|e| StorageError::MigrationFailed {
                version: *version,
                message: e.to_string(),
            })?;
        tracing::info!(version = version, "applied migration");
    }

    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<u32, StorageError> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| StorageError::SqliteError {
            message: e.to_string(),
        })
}

/// Highest version this build knows about.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|(_, v)| *v).unwrap_or(0)
}
