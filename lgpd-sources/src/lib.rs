//! # lgpd-sources
//!
//! One [`SourceReader`](lgpd_core::traits::SourceReader) per driver kind.
//! Every reader enumerates the user tables of the configured database and
//! streams their rows in bounded batches with every cell cast to text.
//! The PostgreSQL and MySQL readers drive `sqlx` on a private
//! current-thread runtime, so handles stay synchronous.

mod batch;
mod blocking;
pub mod mysql;
pub mod postgres;
pub mod registry;
pub mod sqlite;

pub use mysql::MysqlReader;
pub use postgres::PostgresReader;
pub use registry::ReaderRegistry;
pub use sqlite::SqliteReader;

/// Rows fetched per round trip unless a reader is configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 500;
