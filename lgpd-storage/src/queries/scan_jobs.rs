//! scan_jobs queries, including the compare-and-set transition.

use chrono::{DateTime, Utc};
use lgpd_core::errors::StorageError;
use lgpd_core::models::{Finding, JobId, JobState, ScanJob, TransitionPayload};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use super::{format_ts, sql_err, ts_column};

const COLUMNS: &str = "id, source_config_id, created_at, updated_at, state, progress, \
                       failure_reason, findings_json, report_ref";

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScanJob> {
    let state_name: String = row.get(4)?;
    let progress: u8 = row.get(5)?;
    let reason: Option<String> = row.get(6)?;
    let state = JobState::from_columns(&state_name, progress, reason).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Text,
            format!("unknown job state '{state_name}'").into(),
        )
    })?;

    let findings_json: Option<String> = row.get(7)?;
    let findings = findings_json
        .map(|json| serde_json::from_str::<Vec<Finding>>(&json))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(ScanJob {
        id: JobId(row.get(0)?),
        source_config_id: row.get(1)?,
        created_at: ts_column(row, 2)?,
        updated_at: ts_column(row, 3)?,
        state,
        progress_percent: progress,
        findings,
        report_ref: row.get(8)?,
    })
}

/// Insert a job in `pending` at 0%.
pub fn insert_pending(
    conn: &Connection,
    source_config_id: i64,
    now: DateTime<Utc>,
) -> Result<JobId, StorageError> {
    let ts = format_ts(&now);
    conn.prepare_cached(
        "INSERT INTO scan_jobs (source_config_id, created_at, updated_at, state, progress)
         VALUES (?1, ?2, ?2, 'pending', 0)",
    )
    .and_then(|mut stmt| stmt.execute(params![source_config_id, ts]))
    .map_err(sql_err)?;
    Ok(JobId(conn.last_insert_rowid()))
}

pub fn get(conn: &Connection, id: JobId) -> Result<Option<ScanJob>, StorageError> {
    let sql = format!("SELECT {COLUMNS} FROM scan_jobs WHERE id = ?1");
    let mut stmt = conn.prepare_cached(&sql).map_err(sql_err)?;
    stmt.query_row(params![id.0], map_row).optional().map_err(sql_err)
}

/// All jobs, newest first. Ties on `created_at` fall back to id.
pub fn list(conn: &Connection) -> Result<Vec<ScanJob>, StorageError> {
    let sql = format!("SELECT {COLUMNS} FROM scan_jobs ORDER BY created_at DESC, id DESC");
    let mut stmt = conn.prepare_cached(&sql).map_err(sql_err)?;
    let rows = stmt.query_map([], map_row).map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

/// Jobs still `pending` or `in_progress`, oldest first.
pub fn list_unfinished(conn: &Connection) -> Result<Vec<ScanJob>, StorageError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM scan_jobs
         WHERE state IN ('pending', 'in_progress')
         ORDER BY created_at ASC, id ASC"
    );
    let mut stmt = conn.prepare_cached(&sql).map_err(sql_err)?;
    let rows = stmt.query_map([], map_row).map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

pub fn count(conn: &Connection) -> Result<i64, StorageError> {
    conn.query_row("SELECT COUNT(*) FROM scan_jobs", [], |row| row.get(0))
        .map_err(sql_err)
}

pub fn count_for_source(conn: &Connection, source_config_id: i64) -> Result<i64, StorageError> {
    conn.query_row(
        "SELECT COUNT(*) FROM scan_jobs WHERE source_config_id = ?1",
        params![source_config_id],
        |row| row.get(0),
    )
    .map_err(sql_err)
}

pub fn delete_for_source(conn: &Connection, source_config_id: i64) -> Result<usize, StorageError> {
    conn.execute(
        "DELETE FROM scan_jobs WHERE source_config_id = ?1",
        params![source_config_id],
    )
    .map_err(sql_err)
}

/// Progress column value that identifies `state` in a compare-and-set.
pub fn expected_progress(state: &JobState) -> u8 {
    match state {
        JobState::Pending => 0,
        JobState::InProgress { progress } => *progress,
        JobState::Completed => 100,
        // Failed keeps whatever progress was last committed; it never
        // appears as an expected state of a legal edge.
        JobState::Failed { .. } => 0,
    }
}

/// Single-statement compare-and-set on `(state, progress)`.
///
/// The payload columns are written in the same UPDATE. `findings` and
/// `report_ref` are only overwritten when the payload carries them.
/// A failure keeps the last committed progress. Returns rows changed:
/// 0 means the stored state did not match `expected` (or the job is gone).
pub fn compare_and_set(
    conn: &Connection,
    id: JobId,
    expected: &JobState,
    next: &JobState,
    payload: &TransitionPayload,
    now: DateTime<Utc>,
) -> Result<usize, StorageError> {
    let next_progress: Option<u8> = match next {
        JobState::Pending => Some(0),
        JobState::InProgress { progress } => Some(*progress),
        JobState::Completed => Some(100),
        JobState::Failed { .. } => None,
    };
    let findings_json = payload
        .findings
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StorageError::Serialization {
            message: e.to_string(),
        })?;

    let mut stmt = conn
        .prepare_cached(
            "UPDATE scan_jobs
             SET state = ?1,
                 progress = COALESCE(?2, progress),
                 failure_reason = ?3,
                 findings_json = COALESCE(?4, findings_json),
                 report_ref = COALESCE(?5, report_ref),
                 updated_at = ?6
             WHERE id = ?7 AND state = ?8 AND progress = ?9",
        )
        .map_err(sql_err)?;
    stmt.execute(params![
        next.name(),
        next_progress,
        next.failure_reason(),
        findings_json,
        payload.report_ref,
        format_ts(&now),
        id.0,
        expected.name(),
        expected_progress(expected),
    ])
    .map_err(sql_err)
}
