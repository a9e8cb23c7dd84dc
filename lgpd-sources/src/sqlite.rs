//! SQLite source reader. `database_name` is the database file path.

use std::collections::HashSet;
use std::path::Path;

use lgpd_core::errors::SourceError;
use lgpd_core::models::{DriverKind, SourceConfig};
use lgpd_core::traits::{SourceHandle, SourceReader};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};

use crate::batch::{BatchFetch, BatchedHandle, Cursor, Page};
use crate::DEFAULT_BATCH_SIZE;

/// Reads a local SQLite file, read-only.
#[derive(Debug, Clone)]
pub struct SqliteReader {
    batch_size: usize,
}

impl SqliteReader {
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

impl Default for SqliteReader {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceReader for SqliteReader {
    fn driver(&self) -> DriverKind {
        DriverKind::Sqlite
    }

    fn open(&self, config: &SourceConfig) -> Result<Box<dyn SourceHandle>, SourceError> {
        let target = config.target();
        let path = Path::new(&config.database_name);
        if !path.is_file() {
            return Err(SourceError::Connection {
                target,
                message: "database file does not exist".to_string(),
            });
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| SourceError::Connection {
            target: target.clone(),
            message: e.to_string(),
        })?;

        let fetcher = SqliteFetcher {
            conn: Some(conn),
            target,
            without_rowid: HashSet::new(),
            known_tables: Vec::new(),
        };
        Ok(Box::new(BatchedHandle::new(fetcher, self.batch_size)?))
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn cell_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

struct SqliteFetcher {
    conn: Option<Connection>,
    target: String,
    /// Tables that need OFFSET paging because they have no rowid.
    without_rowid: HashSet<String>,
    known_tables: Vec<String>,
}

impl SqliteFetcher {
    fn conn(&self) -> Result<&Connection, SourceError> {
        self.conn.as_ref().ok_or_else(|| SourceError::Read {
            location: self.target.clone(),
            message: "handle is closed".to_string(),
        })
    }

    fn read_err(&self, table: &str, e: rusqlite::Error) -> SourceError {
        SourceError::Read {
            location: format!("{}/{table}", self.target),
            message: e.to_string(),
        }
    }
}

impl BatchFetch for SqliteFetcher {
    fn tables(&mut self) -> Result<Vec<String>, SourceError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT name, wr FROM pragma_table_list
                 WHERE schema = 'main' AND type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )
            .map_err(|e| self.read_err("sqlite_master", e))?;
        let listed = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?)))
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| self.read_err("sqlite_master", e))?;
        drop(stmt);

        let mut tables = Vec::with_capacity(listed.len());
        for (name, without_rowid) in listed {
            if without_rowid {
                self.without_rowid.insert(name.clone());
            }
            tables.push(name);
        }
        self.known_tables = tables.clone();
        Ok(tables)
    }

    fn columns(&mut self, table: &str) -> Result<Vec<String>, SourceError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
            .map_err(|e| self.read_err(table, e))?;
        let columns = stmt
            .query_map(params![table], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| self.read_err(table, e))?;
        Ok(columns)
    }

    fn fetch(
        &mut self,
        table: &str,
        columns: &[String],
        cursor: Cursor,
        limit: usize,
    ) -> Result<Page, SourceError> {
        let conn = self.conn()?;
        let select = columns
            .iter()
            .map(|c| format!("CAST({} AS TEXT)", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let from = quote_ident(table);
        let keyset = !self.without_rowid.contains(table);
        // rowid may be zero or negative; the first page starts at i64::MIN.
        let (sql, bound) = match (keyset, cursor) {
            (true, Cursor::After(key)) => (
                format!("SELECT rowid, {select} FROM {from} WHERE rowid > ?1 ORDER BY rowid LIMIT ?2"),
                key,
            ),
            (true, _) => (
                format!("SELECT rowid, {select} FROM {from} WHERE rowid >= ?1 ORDER BY rowid LIMIT ?2"),
                i64::MIN,
            ),
            (false, _) => (
                format!("SELECT 0, {select} FROM {from} LIMIT ?2 OFFSET ?1"),
                cursor.offset() as i64,
            ),
        };

        let mut stmt = conn.prepare(&sql).map_err(|e| self.read_err(table, e))?;
        let width = columns.len();
        let fetched = stmt
            .query_map(params![bound, limit as i64], |row| {
                let key: i64 = row.get(0)?;
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    values.push(cell_text(row.get_ref(i + 1)?));
                }
                Ok((key, values))
            })
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| self.read_err(table, e))?;

        let next = if keyset {
            fetched.last().map_or(cursor, |(key, _)| Cursor::After(*key))
        } else {
            Cursor::Offset(cursor.offset() + fetched.len() as u64)
        };
        Ok(Page {
            rows: fetched.into_iter().map(|(_, values)| values).collect(),
            next,
        })
    }

    fn estimate_rows(&mut self) -> Option<u64> {
        let conn = self.conn().ok()?;
        let mut total = 0u64;
        for table in &self.known_tables {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)), [], |row| {
                    row.get(0)
                })
                .ok()?;
            total = total.saturating_add(count.max(0) as u64);
        }
        Some(total)
    }

    fn close(&mut self) -> Result<(), SourceError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| SourceError::Read {
                location: self.target.clone(),
                message: format!("close failed: {e}"),
            })?;
        }
        Ok(())
    }
}
