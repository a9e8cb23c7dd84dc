//! External data-source configuration.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Database driver families with a source reader implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Postgres,
    Mysql,
    Sqlite,
}

impl DriverKind {
    pub const ALL: [DriverKind; 3] = [DriverKind::Postgres, DriverKind::Mysql, DriverKind::Sqlite];

    /// Parse a driver string. Accepts the canonical names plus the
    /// Python driver module names older configs were saved with.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "psycopg2" => Some(Self::Postgres),
            "mysql" | "mysql.connector" | "mariadb" => Some(Self::Mysql),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Conventional port, used when a registration omits one.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Postgres => 5432,
            Self::Mysql => 3306,
            Self::Sqlite => 0,
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A registered external data source.
///
/// `driver` is stored verbatim so that configs saved with an unknown driver
/// remain readable; it is resolved to a [`DriverKind`] at submit time.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: i64,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database_name: String,
    pub driver: String,
    pub created_at: DateTime<Utc>,
}

impl SourceConfig {
    /// Resolve the stored driver string.
    pub fn driver_kind(&self) -> Result<DriverKind, ConfigError> {
        DriverKind::parse_str(&self.driver).ok_or_else(|| ConfigError::UnsupportedDriver {
            driver: self.driver.clone(),
        })
    }

    /// Credential-free description of the target, safe for logs and reasons.
    pub fn target(&self) -> String {
        match DriverKind::parse_str(&self.driver) {
            Some(DriverKind::Sqlite) => format!("sqlite://{}", self.database_name),
            Some(kind) => format!("{kind}://{}:{}/{}", self.host, self.port, self.database_name),
            None => format!("{}://{}:{}/{}", self.driver, self.host, self.port, self.database_name),
        }
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("database_name", &self.database_name)
            .field("driver", &self.driver)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Registration payload; id and creation time are assigned by the registry.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSourceConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database_name: String,
    pub driver: String,
}

impl fmt::Debug for NewSourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewSourceConfig")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("database_name", &self.database_name)
            .field("driver", &self.driver)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(driver: &str) -> SourceConfig {
        SourceConfig {
            id: 1,
            name: "crm".into(),
            host: "db.internal".into(),
            port: 5432,
            username: "scanner".into(),
            password: "hunter2".into(),
            database_name: "crm".into(),
            driver: driver.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn legacy_driver_names_resolve() {
        assert_eq!(config("psycopg2").driver_kind().unwrap(), DriverKind::Postgres);
        assert_eq!(config("mysql.connector").driver_kind().unwrap(), DriverKind::Mysql);
        assert_eq!(config("SQLite").driver_kind().unwrap(), DriverKind::Sqlite);
    }

    #[test]
    fn unknown_driver_is_config_error() {
        let err = config("oracle").driver_kind().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedDriver { ref driver } if driver == "oracle"));
    }

    #[test]
    fn debug_and_target_hide_password() {
        let cfg = config("postgres");
        assert!(!format!("{cfg:?}").contains("hunter2"));
        assert_eq!(cfg.target(), "postgres://db.internal:5432/crm");
    }
}
