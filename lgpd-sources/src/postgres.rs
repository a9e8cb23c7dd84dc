//! PostgreSQL source reader over `sqlx`.

use std::time::Duration;

use lgpd_core::errors::SourceError;
use lgpd_core::models::{DriverKind, SourceConfig};
use lgpd_core::traits::{SourceHandle, SourceReader};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection, Row as _};
use tokio::runtime::Runtime;

use crate::batch::{BatchFetch, BatchedHandle, Cursor, Page};
use crate::blocking::{connect_with_timeout, current_thread_runtime, DEFAULT_CONNECT_TIMEOUT};
use crate::DEFAULT_BATCH_SIZE;

/// Scans the tables of one schema (default `public`).
#[derive(Debug, Clone)]
pub struct PostgresReader {
    schema: String,
    batch_size: usize,
    connect_timeout: Duration,
}

impl PostgresReader {
    pub fn new() -> Self {
        Self {
            schema: "public".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for PostgresReader {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceReader for PostgresReader {
    fn driver(&self) -> DriverKind {
        DriverKind::Postgres
    }

    fn open(&self, config: &SourceConfig) -> Result<Box<dyn SourceHandle>, SourceError> {
        let target = config.target();
        let rt = current_thread_runtime(&target)?;
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(&config.password)
            .database(&config.database_name);
        let conn = connect_with_timeout(&rt, &target, self.connect_timeout, options.connect())?;
        tracing::debug!(target = %target, schema = %self.schema, "postgres connected");

        let fetcher = PgFetcher {
            rt,
            conn: Some(conn),
            target,
            schema: self.schema.clone(),
        };
        Ok(Box::new(BatchedHandle::new(fetcher, self.batch_size)?))
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

struct PgFetcher {
    rt: Runtime,
    conn: Option<PgConnection>,
    target: String,
    schema: String,
}

impl PgFetcher {
    fn read_err(&self, table: &str, e: sqlx::Error) -> SourceError {
        SourceError::Read {
            location: format!("{}/{table}", self.target),
            message: e.to_string(),
        }
    }

    fn closed(&self) -> SourceError {
        SourceError::Read {
            location: self.target.clone(),
            message: "handle is closed".to_string(),
        }
    }
}

impl BatchFetch for PgFetcher {
    fn tables(&mut self) -> Result<Vec<String>, SourceError> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(self.closed());
        };
        let result = self.rt.block_on(
            sqlx::query_scalar::<_, String>(
                "SELECT table_name::text FROM information_schema.tables
                 WHERE table_schema = $1 AND table_type = 'BASE TABLE'
                 ORDER BY table_name",
            )
            .bind(&self.schema)
            .fetch_all(&mut *conn),
        );
        result.map_err(|e| self.read_err("information_schema.tables", e))
    }

    fn columns(&mut self, table: &str) -> Result<Vec<String>, SourceError> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(self.closed());
        };
        let result = self.rt.block_on(
            sqlx::query_scalar::<_, String>(
                "SELECT column_name::text FROM information_schema.columns
                 WHERE table_schema = $1 AND table_name = $2
                 ORDER BY ordinal_position",
            )
            .bind(&self.schema)
            .bind(table)
            .fetch_all(&mut *conn),
        );
        result.map_err(|e| self.read_err(table, e))
    }

    fn fetch(
        &mut self,
        table: &str,
        columns: &[String],
        cursor: Cursor,
        limit: usize,
    ) -> Result<Page, SourceError> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(self.closed());
        };
        let select = columns
            .iter()
            .map(|c| format!("{}::text", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {select} FROM {}.{} ORDER BY ctid LIMIT $1 OFFSET $2",
            quote_ident(&self.schema),
            quote_ident(table)
        );
        let result = self.rt.block_on(
            sqlx::query(&sql)
                .bind(limit as i64)
                .bind(cursor.offset() as i64)
                .fetch_all(&mut *conn),
        );
        let rows = result.map_err(|e| self.read_err(table, e))?;

        let mut page = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                let value: Option<String> =
                    row.try_get(i).map_err(|e| self.read_err(table, e))?;
                values.push(value);
            }
            page.push(values);
        }
        Ok(Page {
            next: Cursor::Offset(cursor.offset() + page.len() as u64),
            rows: page,
        })
    }

    fn estimate_rows(&mut self) -> Option<u64> {
        let conn = self.conn.as_mut()?;
        let estimate = self.rt.block_on(
            sqlx::query_scalar::<_, i64>(
                "SELECT COALESCE(SUM(n_live_tup), 0)::bigint FROM pg_stat_user_tables
                 WHERE schemaname = $1",
            )
            .bind(&self.schema)
            .fetch_one(&mut *conn),
        );
        match estimate {
            Ok(n) => Some(n.max(0) as u64),
            Err(e) => {
                tracing::debug!(target = %self.target, error = %e, "row estimate unavailable");
                None
            }
        }
    }

    fn close(&mut self) -> Result<(), SourceError> {
        match self.conn.take() {
            Some(conn) => self.rt.block_on(conn.close()).map_err(|e| SourceError::Read {
                location: self.target.clone(),
                message: format!("close failed: {e}"),
            }),
            None => Ok(()),
        }
    }
}
