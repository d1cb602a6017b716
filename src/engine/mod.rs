//! Database Engines and Connection Configuration
//!
//! Each engine (`PostgreSQL`, `MySQL`, `SQLite`) provides a synchronous
//! session that executes canonical `?` statements and answers catalog
//! queries. Engine choice also fixes the placeholder dialect callers write.
//!
//! # Engine Isolation
//! Each engine implementation is completely independent.
//! No shared SQL helpers or cross-engine abstractions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::charset::Charset;
use crate::error::{CompatError, Result};
use crate::remap::PlaceholderStyle;
use crate::statement::EngineSession;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(any(feature = "postgres", feature = "mysql"))]
mod runtime;

/// Supported database engine types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// `PostgreSQL` database
    Postgres,
    /// `MySQL` database (includes `MariaDB`)
    MySQL,
    /// `SQLite` database
    SQLite,
}

impl DatabaseType {
    /// Get the engine name as a string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySQL => "mysql",
            Self::SQLite => "sqlite",
        }
    }

    /// Placeholder syntax callers use with this engine
    #[must_use]
    pub const fn placeholder_style(&self) -> PlaceholderStyle {
        match self {
            Self::Postgres => PlaceholderStyle::Numbered,
            Self::MySQL | Self::SQLite => PlaceholderStyle::Ordinal,
        }
    }

    const fn default_port(self) -> Option<u16> {
        match self {
            Self::Postgres => Some(5432),
            Self::MySQL => Some(3306),
            Self::SQLite => None,
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DatabaseType {
    type Err = CompatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pgsql" => Ok(Self::Postgres),
            "mysql" | "mariadb" | "mysqli" => Ok(Self::MySQL),
            "sqlite" | "sqlite3" => Ok(Self::SQLite),
            other => Err(CompatError::invalid_input(format!("Unknown engine '{other}'"))),
        }
    }
}

/// Connection configuration for database engines
///
/// Fields are engine-specific (e.g., `file` only applies to `SQLite`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database engine type
    pub engine: DatabaseType,

    /// Hostname (for postgres/mysql)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Port number (for postgres/mysql)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Username (for postgres/mysql)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password (for postgres/mysql)
    /// WARNING: Sensitive data, do not log or include in error messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Database name (for postgres/mysql)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Database file path (for sqlite)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Result text charset name (mysql), e.g. `latin1`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
}

impl ConnectionConfig {
    /// Create a new `PostgreSQL` connection config
    #[must_use]
    pub const fn postgres(
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    ) -> Self {
        Self {
            engine: DatabaseType::Postgres,
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            database: Some(database),
            file: None,
            charset: None,
        }
    }

    /// Create a new `MySQL` connection config
    #[must_use]
    pub const fn mysql(
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    ) -> Self {
        Self {
            engine: DatabaseType::MySQL,
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            database: Some(database),
            file: None,
            charset: None,
        }
    }

    /// Create a new `SQLite` connection config
    #[must_use]
    pub const fn sqlite(file: PathBuf) -> Self {
        Self {
            engine: DatabaseType::SQLite,
            host: None,
            port: None,
            user: None,
            password: None,
            database: None,
            file: Some(file),
            charset: None,
        }
    }

    #[must_use]
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Resolve the configured charset; UTF-8 when unset
    pub fn resolve_charset(&self) -> Result<Charset> {
        match self.charset.as_deref() {
            None => Ok(Charset::default()),
            Some(name) => Charset::from_name(name)
                .ok_or_else(|| CompatError::config_error(format!("Unsupported charset '{name}'"))),
        }
    }

    /// Credential-free identity of the target database.
    ///
    /// Used to key cached metadata and pooled links; never contains the
    /// password.
    #[must_use]
    pub fn url(&self) -> String {
        match self.engine {
            DatabaseType::SQLite => {
                let file = self.file.as_ref().map_or_else(String::new, |f| f.display().to_string());
                format!("sqlite:{file}")
            }
            engine => {
                let host = self.host.as_deref().unwrap_or("localhost");
                let port = self.port.or(engine.default_port()).unwrap_or_default();
                let database = self.database.as_deref().unwrap_or_default();
                format!("{engine}://{host}:{port}/{database}")
            }
        }
    }
}

/// Open a session for `config`
pub fn connect(config: &ConnectionConfig) -> Result<Box<dyn EngineSession>> {
    match config.engine {
        #[cfg(feature = "sqlite")]
        DatabaseType::SQLite => Ok(Box::new(sqlite::SqliteSession::open(config)?)),

        #[cfg(feature = "postgres")]
        DatabaseType::Postgres => Ok(Box::new(postgres::PostgresSession::open(config)?)),

        #[cfg(feature = "mysql")]
        DatabaseType::MySQL => Ok(Box::new(mysql::MySqlSession::open(config)?)),

        #[allow(unreachable_patterns)]
        other => Err(CompatError::engine_error(
            other.as_str(),
            "support for this engine was not compiled in",
        )),
    }
}
