//! # lgpd-storage
//!
//! SQLite persistence for scan jobs and source configs. One serialized
//! writer connection, a round-robin read pool, migrations tracked with
//! `PRAGMA user_version`.

pub mod connection;
pub mod engine;
pub mod migrations;
pub mod queries;

pub use connection::DatabaseManager;
pub use engine::StorageEngine;
