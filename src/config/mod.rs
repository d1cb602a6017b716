//! Configuration Management
//!
//! Settings are JSON files holding the metadata cache settings and named
//! connection profiles.
//!
//! # Configuration Locations
//! - Local: `.dbcompat/config.json` (team-shareable, per-project)
//! - Global: `<config_dir>/dbcompat/config.json` (per-user)
//!
//! # Resolution Precedence
//! 1. Local config file (`.dbcompat/config.json`)
//! 2. Global config file
//! 3. Built-in defaults
//!
//! # Example
//! ```json
//! {
//!   "cache": { "max_idle_ms": 10000, "capacity": 256 },
//!   "connections": {
//!     "shop": { "engine": "mysql", "host": "localhost", "user": "app",
//!               "password_env": "SHOP_DB_PASSWORD", "database": "shop",
//!               "charset": "latin1" }
//!   },
//!   "default": "shop"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::engine::ConnectionConfig;
use crate::error::{CompatError, Result};
use crate::metadata::CacheSettings;

/// Contents of one configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Metadata cache settings; defaults apply when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheSettings>,

    /// Named connection profiles
    #[serde(default)]
    pub connections: BTreeMap<String, StoredConnection>,

    /// Name of the default connection (must exist in connections map)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Stored connection configuration
///
/// Like `ConnectionConfig`, but the password may be taken from an environment
/// variable instead of being stored in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConnection {
    /// Connection configuration
    #[serde(flatten)]
    pub config: ConnectionConfig,

    /// Environment variable name for password (if not storing password directly)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
}

impl StoredConnection {
    /// Resolve environment variables and return a `ConnectionConfig`
    pub fn resolve(&self) -> Result<ConnectionConfig> {
        let mut config = self.config.clone();

        if let Some(env_var) = &self.password_env {
            let password = std::env::var(env_var).map_err(|_| {
                CompatError::config_error(format!(
                    "Environment variable {env_var} not found for password"
                ))
            })?;
            config.password = Some(password);
        }

        Ok(config)
    }
}

impl Settings {
    /// Effective cache settings
    #[must_use]
    pub fn cache_settings(&self) -> CacheSettings {
        self.cache.unwrap_or_default()
    }

    /// Overlay `other` on top of `self`; `other` wins on conflicts
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        if other.cache.is_some() {
            self.cache = other.cache;
        }
        self.connections.extend(other.connections);
        if other.default.is_some() {
            self.default = other.default;
        }
        self
    }

    /// Resolve a named connection, or the default one when `name` is `None`
    pub fn resolve_connection(&self, name: Option<&str>) -> Result<ConnectionConfig> {
        let available = || self.connections.keys().cloned().collect::<Vec<_>>().join(", ");

        let name = match name {
            Some(n) => n,
            None => self.default.as_deref().ok_or_else(|| {
                CompatError::config_error(format!(
                    "No default connection set. Available connections: [{}]",
                    available()
                ))
            })?,
        };

        let stored = self.connections.get(name).ok_or_else(|| {
            CompatError::config_error(format!(
                "Connection '{name}' not found. Available connections: [{}]",
                available()
            ))
        })?;

        stored.resolve()
    }
}

/// Get path to local config file (`.dbcompat/config.json`)
pub fn local_config_path() -> Result<PathBuf> {
    let current_dir = std::env::current_dir().map_err(|e| {
        CompatError::config_error(format!("Could not determine current directory: {e}"))
    })?;

    Ok(current_dir.join(".dbcompat").join("config.json"))
}

/// Get path to global config file (`<config_dir>/dbcompat/config.json`)
pub fn global_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| CompatError::config_error("Could not determine user config directory"))?;

    Ok(config_dir.join("dbcompat").join("config.json"))
}

/// Load settings from a config file; a missing file yields defaults
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| CompatError::config_error(format!("Could not read config file: {e}")))?;

    serde_json::from_str(&contents).map_err(|e| {
        CompatError::config_error(format!("Invalid config file {}: {e}", path.display()))
    })
}

/// Save settings to a config file, creating its directory
pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            CompatError::config_error(format!("Could not create config directory: {e}"))
        })?;
    }

    let contents = serde_json::to_string_pretty(settings)
        .map_err(|e| CompatError::config_error(format!("Could not serialize config: {e}")))?;

    fs::write(path, contents)
        .map_err(|e| CompatError::config_error(format!("Could not write config file: {e}")))
}

/// Load global then local settings, local taking precedence
pub fn load_with_precedence() -> Result<Settings> {
    let global_path = global_config_path()?;
    let local_path = local_config_path()?;

    debug!(global = %global_path.display(), local = %local_path.display(), "loading settings");

    Ok(load_settings(&global_path)?.merge(load_settings(&local_path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DatabaseType;
    use pretty_assertions::assert_eq;

    fn stored(database: &str) -> StoredConnection {
        StoredConnection {
            config: ConnectionConfig::mysql(
                "localhost".to_string(),
                3306,
                "app".to_string(),
                "secret".to_string(),
                database.to_string(),
            ),
            password_env: None,
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("dbcompat_config_{name}_{}", std::process::id())).join("config.json")
    }

    #[test]
    fn test_settings_deserialize_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.cache_settings(), CacheSettings::default());
    }

    #[test]
    fn test_partial_cache_settings() {
        let settings: Settings = serde_json::from_str(r#"{"cache":{"max_idle_ms":500}}"#).unwrap();
        let cache = settings.cache_settings();
        assert_eq!(cache.max_idle_ms, 500);
        assert_eq!(cache.capacity, CacheSettings::default().capacity);
    }

    #[test]
    fn test_stored_connection_flattened() {
        let json = r#"{
            "engine": "mysql",
            "host": "db",
            "user": "app",
            "database": "shop",
            "charset": "latin1",
            "password_env": "SHOP_PW"
        }"#;
        let stored: StoredConnection = serde_json::from_str(json).unwrap();
        assert_eq!(stored.config.engine, DatabaseType::MySQL);
        assert_eq!(stored.config.charset.as_deref(), Some("latin1"));
        assert_eq!(stored.password_env.as_deref(), Some("SHOP_PW"));
    }

    #[test]
    fn test_stored_connection_resolve_direct_password() {
        let config = stored("shop").resolve().unwrap();
        assert_eq!(config.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_stored_connection_resolve_env_var() {
        let var = "DBCOMPAT_TEST_PASSWORD_RESOLVE";
        std::env::set_var(var, "from-env");

        let mut conn = stored("shop");
        conn.password_env = Some(var.to_string());
        let config = conn.resolve().unwrap();
        assert_eq!(config.password.as_deref(), Some("from-env"));

        std::env::remove_var(var);
    }

    #[test]
    fn test_stored_connection_resolve_missing_env_var() {
        let mut conn = stored("shop");
        conn.password_env = Some("DBCOMPAT_TEST_PASSWORD_NEVER_SET".to_string());

        let err = conn.resolve().unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert!(err.message().contains("DBCOMPAT_TEST_PASSWORD_NEVER_SET"));
    }

    #[test]
    fn test_merge_local_overrides_global() {
        let mut global = Settings::default();
        global.connections.insert("shop".into(), stored("shop_global"));
        global.connections.insert("crm".into(), stored("crm"));
        global.default = Some("crm".into());
        global.cache = Some(CacheSettings { max_idle_ms: 1, capacity: 2 });

        let mut local = Settings::default();
        local.connections.insert("shop".into(), stored("shop_local"));
        local.default = Some("shop".into());

        let merged = global.merge(local);
        assert_eq!(merged.connections.len(), 2);
        assert_eq!(merged.connections["shop"].config.database.as_deref(), Some("shop_local"));
        assert_eq!(merged.default.as_deref(), Some("shop"));
        // local file did not set cache settings
        assert_eq!(merged.cache_settings().max_idle_ms, 1);
    }

    #[test]
    fn test_resolve_connection_default_and_named() {
        let mut settings = Settings::default();
        settings.connections.insert("shop".into(), stored("shop"));
        settings.connections.insert("crm".into(), stored("crm"));

        let err = settings.resolve_connection(None).unwrap_err();
        assert!(err.message().contains("No default connection"));

        settings.default = Some("shop".into());
        assert_eq!(settings.resolve_connection(None).unwrap().database.as_deref(), Some("shop"));
        assert_eq!(settings.resolve_connection(Some("crm")).unwrap().database.as_deref(), Some("crm"));

        let err = settings.resolve_connection(Some("nope")).unwrap_err();
        assert!(err.message().contains("Available connections: [crm, shop]"));
    }

    #[test]
    fn test_save_and_load_settings() {
        let path = temp_path("roundtrip");
        let _ = fs::remove_file(&path);

        let mut settings = Settings::default();
        settings.connections.insert("shop".into(), stored("shop"));
        settings.default = Some("shop".into());
        settings.cache = Some(CacheSettings { max_idle_ms: 2_000, capacity: 16 });

        save_settings(&path, &settings).unwrap();
        let loaded = load_settings(&path).unwrap();
        assert_eq!(loaded, settings);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let settings = load_settings(Path::new("/nonexistent/dbcompat/config.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_invalid_json() {
        let path = temp_path("invalid");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let err = load_settings(&path).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
