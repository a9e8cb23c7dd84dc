//! Driver kind → reader lookup, populated once at startup.

use std::collections::HashMap;
use std::sync::Arc;

use lgpd_core::errors::SourceError;
use lgpd_core::models::{DriverKind, SourceConfig};
use lgpd_core::traits::SourceReader;

use crate::{MysqlReader, PostgresReader, SqliteReader};

#[derive(Clone, Default)]
pub struct ReaderRegistry {
    readers: HashMap<DriverKind, Arc<dyn SourceReader>>,
}

impl ReaderRegistry {
    /// Empty registry. Every lookup fails until readers are registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// SQLite, PostgreSQL and MySQL readers with default settings.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SqliteReader::new()));
        registry.register(Arc::new(PostgresReader::new()));
        registry.register(Arc::new(MysqlReader::new()));
        registry
    }

    /// Register `reader` under its own driver kind, replacing any previous one.
    pub fn register(&mut self, reader: Arc<dyn SourceReader>) {
        let kind = reader.driver();
        if self.readers.insert(kind, reader).is_some() {
            tracing::debug!(driver = %kind, "replaced source reader");
        }
    }

    pub fn get(&self, kind: DriverKind) -> Option<Arc<dyn SourceReader>> {
        self.readers.get(&kind).cloned()
    }

    /// Resolve the reader for `config` without touching the network.
    pub fn resolve(&self, config: &SourceConfig) -> Result<Arc<dyn SourceReader>, SourceError> {
        DriverKind::parse_str(&config.driver)
            .and_then(|kind| self.get(kind))
            .ok_or_else(|| SourceError::UnsupportedDriver {
                driver: config.driver.clone(),
            })
    }

    /// Registered kinds in declaration order.
    pub fn kinds(&self) -> Vec<DriverKind> {
        DriverKind::ALL
            .into_iter()
            .filter(|k| self.readers.contains_key(k))
            .collect()
    }
}

impl std::fmt::Debug for ReaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
