//! Query modules, one per table. Free functions over `&Connection`.

pub mod scan_jobs;
pub mod source_configs;

use chrono::{DateTime, SecondsFormat, Utc};
use lgpd_core::errors::StorageError;
use rusqlite::types::Type;

/// Timestamps are stored as RFC 3339 text with microseconds and a `Z`
/// suffix, so lexical order matches chronological order.
pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn ts_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn sql_err(e: rusqlite::Error) -> StorageError {
    match e {
        rusqlite::Error::FromSqlConversionFailure(idx, _, source) => StorageError::Serialization {
            message: format!("column {idx}: {source}"),
        },
        other => StorageError::SqliteError {
            message: other.to_string(),
        },
    }
}

pub(crate) fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
