//! MySQL / MariaDB source reader over `sqlx`. Scans the tables of the
//! configured database.

use std::collections::HashMap;
use std::time::Duration;

use lgpd_core::errors::SourceError;
use lgpd_core::models::{DriverKind, SourceConfig};
use lgpd_core::traits::{SourceHandle, SourceReader};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Connection, Row as _};
use tokio::runtime::Runtime;

use crate::batch::{BatchFetch, BatchedHandle, Cursor, Page};
use crate::blocking::{connect_with_timeout, current_thread_runtime, DEFAULT_CONNECT_TIMEOUT};
use crate::DEFAULT_BATCH_SIZE;

#[derive(Debug, Clone)]
pub struct MysqlReader {
    batch_size: usize,
    connect_timeout: Duration,
}

impl MysqlReader {
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
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

impl Default for MysqlReader {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceReader for MysqlReader {
    fn driver(&self) -> DriverKind {
        DriverKind::Mysql
    }

    fn open(&self, config: &SourceConfig) -> Result<Box<dyn SourceHandle>, SourceError> {
        let target = config.target();
        let rt = current_thread_runtime(&target)?;
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(&config.password)
            .database(&config.database_name);
        let conn = connect_with_timeout(&rt, &target, self.connect_timeout, options.connect())?;
        tracing::debug!(target = %target, "mysql connected");

        let fetcher = MysqlFetcher {
            rt,
            conn: Some(conn),
            target,
            database: config.database_name.clone(),
            order_by: HashMap::new(),
        };
        Ok(Box::new(BatchedHandle::new(fetcher, self.batch_size)?))
    }
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// A total row order for OFFSET paging: the primary key when the table has
/// one, otherwise every column compared as bytes.
fn order_clause(primary_key: &[String], columns: &[String]) -> String {
    if primary_key.is_empty() {
        columns
            .iter()
            .map(|c| format!("CAST({} AS BINARY)", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        primary_key
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

struct MysqlFetcher {
    rt: Runtime,
    conn: Option<MySqlConnection>,
    target: String,
    database: String,
    /// ORDER BY clause per table, settled when its columns are listed.
    order_by: HashMap<String, String>,
}

impl MysqlFetcher {
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

impl BatchFetch for MysqlFetcher {
    fn tables(&mut self) -> Result<Vec<String>, SourceError> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(self.closed());
        };
        let result = self.rt.block_on(
            sqlx::query_scalar::<_, String>(
                "SELECT CAST(table_name AS CHAR) FROM information_schema.tables
                 WHERE table_schema = ? AND table_type = 'BASE TABLE'
                 ORDER BY table_name",
            )
            .bind(&self.database)
            .fetch_all(&mut *conn),
        );
        result.map_err(|e| self.read_err("information_schema.tables", e))
    }

    fn columns(&mut self, table: &str) -> Result<Vec<String>, SourceError> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(self.closed());
        };
        let database = &self.database;
        let result = self.rt.block_on(async {
            let columns = sqlx::query_scalar::<_, String>(
                "SELECT CAST(column_name AS CHAR) FROM information_schema.columns
                 WHERE table_schema = ? AND table_name = ?
                 ORDER BY ordinal_position",
            )
            .bind(database)
            .bind(table)
            .fetch_all(&mut *conn)
            .await?;
            let primary_key = sqlx::query_scalar::<_, String>(
                "SELECT CAST(column_name AS CHAR) FROM information_schema.key_column_usage
                 WHERE table_schema = ? AND table_name = ? AND constraint_name = 'PRIMARY'
                 ORDER BY ordinal_position",
            )
            .bind(database)
            .bind(table)
            .fetch_all(&mut *conn)
            .await?;
            Ok::<_, sqlx::Error>((columns, primary_key))
        });
        let (columns, primary_key) = result.map_err(|e| self.read_err(table, e))?;

        if primary_key.is_empty() {
            tracing::debug!(target = %self.target, table, "no primary key, ordering by every column");
        }
        self.order_by
            .insert(table.to_string(), order_clause(&primary_key, &columns));
        Ok(columns)
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
            .map(|c| format!("CAST({} AS CHAR)", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let order_by = match self.order_by.get(table) {
            Some(clause) => clause.clone(),
            None => order_clause(&[], columns),
        };
        let sql = format!(
            "SELECT {select} FROM {} ORDER BY {order_by} LIMIT ? OFFSET ?",
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
                "SELECT CAST(COALESCE(SUM(table_rows), 0) AS SIGNED)
                 FROM information_schema.tables WHERE table_schema = ?",
            )
            .bind(&self.database)
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

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn orders_by_primary_key_columns_in_key_order() {
        let clause = order_clause(&names(&["tenant", "id"]), &names(&["id", "tenant", "email"]));
        assert_eq!(clause, "`tenant`, `id`");
    }

    #[test]
    fn falls_back_to_every_column_as_bytes() {
        let clause = order_clause(&[], &names(&["email", "odd`name"]));
        assert_eq!(clause, "CAST(`email` AS BINARY), CAST(`odd``name` AS BINARY)");
    }
}
