//! source_configs CRUD queries.

use chrono::{DateTime, SubsecRound, Utc};
use lgpd_core::errors::StorageError;
use lgpd_core::models::{NewSourceConfig, SourceConfig};
use rusqlite::{params, Connection, OptionalExtension};

use super::{format_ts, is_unique_violation, sql_err, ts_column};

const COLUMNS: &str =
    "id, name, host, port, username, password, database_name, driver, created_at";

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SourceConfig> {
    Ok(SourceConfig {
        id: row.get(0)?,
        name: row.get(1)?,
        host: row.get(2)?,
        port: row.get(3)?,
        username: row.get(4)?,
        password: row.get(5)?,
        database_name: row.get(6)?,
        driver: row.get(7)?,
        created_at: ts_column(row, 8)?,
    })
}

pub fn insert(
    conn: &Connection,
    config: &NewSourceConfig,
    created_at: DateTime<Utc>,
) -> Result<SourceConfig, StorageError> {
    // Match the stored precision so the returned value equals a re-read.
    let created_at = created_at.trunc_subsecs(6);
    conn.prepare_cached(
        "INSERT INTO source_configs
            (name, host, port, username, password, database_name, driver, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .and_then(|mut stmt| {
        stmt.execute(params![
            config.name,
            config.host,
            config.port,
            config.username,
            config.password,
            config.database_name,
            config.driver,
            format_ts(&created_at),
        ])
    })
    .map_err(|e| {
        if is_unique_violation(&e) {
            StorageError::DuplicateName {
                name: config.name.clone(),
            }
        } else {
            sql_err(e)
        }
    })?;

    Ok(SourceConfig {
        id: conn.last_insert_rowid(),
        name: config.name.clone(),
        host: config.host.clone(),
        port: config.port,
        username: config.username.clone(),
        password: config.password.clone(),
        database_name: config.database_name.clone(),
        driver: config.driver.clone(),
        created_at,
    })
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<SourceConfig>, StorageError> {
    let sql = format!("SELECT {COLUMNS} FROM source_configs WHERE id = ?1");
    let mut stmt = conn.prepare_cached(&sql).map_err(sql_err)?;
    stmt.query_row(params![id], map_row).optional().map_err(sql_err)
}

pub fn get_by_name(conn: &Connection, name: &str) -> Result<Option<SourceConfig>, StorageError> {
    let sql = format!("SELECT {COLUMNS} FROM source_configs WHERE name = ?1");
    let mut stmt = conn.prepare_cached(&sql).map_err(sql_err)?;
    stmt.query_row(params![name], map_row).optional().map_err(sql_err)
}

pub fn list(conn: &Connection) -> Result<Vec<SourceConfig>, StorageError> {
    let sql = format!("SELECT {COLUMNS} FROM source_configs ORDER BY name ASC");
    let mut stmt = conn.prepare_cached(&sql).map_err(sql_err)?;
    let rows = stmt.query_map([], map_row).map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

/// Overwrite every mutable field. Returns the number of rows changed.
pub fn update(conn: &Connection, config: &SourceConfig) -> Result<usize, StorageError> {
    conn.prepare_cached(
        "UPDATE source_configs
         SET name = ?1, host = ?2, port = ?3, username = ?4, password = ?5,
             database_name = ?6, driver = ?7
         WHERE id = ?8",
    )
    .and_then(|mut stmt| {
        stmt.execute(params![
            config.name,
            config.host,
            config.port,
            config.username,
            config.password,
            config.database_name,
            config.driver,
            config.id,
        ])
    })
    .map_err(|e| {
        if is_unique_violation(&e) {
            StorageError::DuplicateName {
                name: config.name.clone(),
            }
        } else {
            sql_err(e)
        }
    })
}

pub fn delete(conn: &Connection, id: i64) -> Result<usize, StorageError> {
    conn.execute("DELETE FROM source_configs WHERE id = ?1", params![id])
        .map_err(sql_err)
}
