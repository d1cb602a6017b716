//! Process-wide table metadata cache.
//!
//! Entries are checked for staleness lazily, when they are looked up; nothing
//! sweeps them in the background. The map itself is bounded and safe for
//! concurrent use, but no lock is held while an entry is rebuilt, so two
//! callers missing the same key may both query the catalog. The rebuild is
//! idempotent and the last insert wins.

use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::lookup::{describe_columns, CatalogSource};
use super::table::{TableDescriptor, TableKey, DEFAULT_MAX_IDLE_MS};
use crate::error::{CompatError, Result};

/// Default number of cached tables
pub const DEFAULT_CAPACITY: u64 = 256;

/// Cache sizing and staleness settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Staleness window for each entry, in milliseconds
    #[serde(default = "default_max_idle_ms")]
    pub max_idle_ms: u64,

    /// Maximum number of cached tables
    #[serde(default = "default_capacity")]
    pub capacity: u64,
}

const fn default_max_idle_ms() -> u64 {
    DEFAULT_MAX_IDLE_MS
}

const fn default_capacity() -> u64 {
    DEFAULT_CAPACITY
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { max_idle_ms: DEFAULT_MAX_IDLE_MS, capacity: DEFAULT_CAPACITY }
    }
}

/// Table metadata cache keyed by `(url, catalog, schema, table)`
#[derive(Clone)]
pub struct TableMetadataCache {
    entries: Cache<TableKey, Arc<TableDescriptor>>,
    settings: CacheSettings,
}

impl std::fmt::Debug for TableMetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableMetadataCache").field("settings", &self.settings).finish_non_exhaustive()
    }
}

impl Default for TableMetadataCache {
    fn default() -> Self {
        Self::new(CacheSettings::default())
    }
}

impl TableMetadataCache {
    #[must_use]
    pub fn new(settings: CacheSettings) -> Self {
        Self { entries: Cache::builder().max_capacity(settings.capacity).build(), settings }
    }

    #[must_use]
    pub const fn settings(&self) -> CacheSettings {
        self.settings
    }

    /// Return the cached descriptor for `key` if it is still valid at `now`
    #[must_use]
    pub fn lookup(&self, key: &TableKey, now: u64) -> Option<Arc<TableDescriptor>> {
        self.entries.get(key).filter(|table| table.is_valid(now))
    }

    /// Return the valid cached descriptor, or describe the table and cache it.
    ///
    /// A failed describe leaves any existing entry untouched.
    pub fn get_or_load(
        &self,
        key: &TableKey,
        source: &mut dyn CatalogSource,
        now: u64,
    ) -> Result<Arc<TableDescriptor>> {
        if key.table.is_empty() {
            return Err(CompatError::invalid_input("Table name cannot be empty"));
        }

        if let Some(table) = self.lookup(key, now) {
            return Ok(table);
        }

        debug!(table = %key, "loading table metadata");
        let columns = describe_columns(source, key)?;
        let table = Arc::new(TableDescriptor::new(
            key.catalog.clone(),
            key.schema.clone(),
            key.table.clone(),
            columns,
            now,
            self.settings.max_idle_ms,
        ));

        self.entries.insert(key.clone(), Arc::clone(&table));
        Ok(table)
    }

    /// Drop one entry
    pub fn invalidate(&self, key: &TableKey) {
        self.entries.invalidate(key);
    }

    /// Drop every entry (schema changed)
    pub fn invalidate_all(&self) {
        debug!("invalidating all table metadata");
        self.entries.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::lookup::tests::FakeCatalog;

    fn key() -> TableKey {
        TableKey::new("fake:", None, None, "users")
    }

    #[test]
    fn test_hit_within_window_returns_same_instance() {
        let cache = TableMetadataCache::default();
        let mut catalog = FakeCatalog::users();

        let first = cache.get_or_load(&key(), &mut catalog, 0).unwrap();
        let second = cache.get_or_load(&key(), &mut catalog, DEFAULT_MAX_IDLE_MS).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(catalog.column_calls, 1);
    }

    #[test]
    fn test_stale_entry_rebuilt_once() {
        let cache = TableMetadataCache::default();
        let mut catalog = FakeCatalog::users();

        let first = cache.get_or_load(&key(), &mut catalog, 0).unwrap();
        let later = DEFAULT_MAX_IDLE_MS + 1;
        let second = cache.get_or_load(&key(), &mut catalog, later).unwrap();
        let third = cache.get_or_load(&key(), &mut catalog, later).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&second, &third));
        assert_eq!(second.created_at(), later);
        assert_eq!(catalog.column_calls, 2);
    }

    #[test]
    fn test_lookup_ignores_stale_entries() {
        let cache = TableMetadataCache::default();
        let mut catalog = FakeCatalog::users();
        cache.get_or_load(&key(), &mut catalog, 0).unwrap();

        assert!(cache.lookup(&key(), 10).is_some());
        assert!(cache.lookup(&key(), DEFAULT_MAX_IDLE_MS + 1).is_none());
        assert!(cache.lookup(&TableKey::new("other:", None, None, "users"), 10).is_none());
    }

    #[test]
    fn test_failed_load_keeps_previous_entry() {
        let cache = TableMetadataCache::default();
        let mut catalog = FakeCatalog::users();
        let first = cache.get_or_load(&key(), &mut catalog, 0).unwrap();

        catalog.columns = Err("connection reset".into());
        let later = DEFAULT_MAX_IDLE_MS + 5;
        assert!(cache.get_or_load(&key(), &mut catalog, later).is_err());

        // still there, and still fresh from the point of view of its own clock
        let cached = cache.lookup(&key(), 0).unwrap();
        assert!(Arc::ptr_eq(&first, &cached));
    }

    #[test]
    fn test_failed_first_load_caches_nothing() {
        let cache = TableMetadataCache::default();
        let mut catalog = FakeCatalog::users();
        catalog.columns = Err("no such table".into());

        assert!(cache.get_or_load(&key(), &mut catalog, 0).is_err());
        assert!(cache.lookup(&key(), 0).is_none());
    }

    #[test]
    fn test_invalidate_all_forces_rebuild() {
        let cache = TableMetadataCache::default();
        let mut catalog = FakeCatalog::users();
        cache.get_or_load(&key(), &mut catalog, 0).unwrap();

        cache.invalidate_all();
        cache.get_or_load(&key(), &mut catalog, 1).unwrap();
        assert_eq!(catalog.column_calls, 2);
    }

    #[test]
    fn test_custom_max_idle() {
        let cache = TableMetadataCache::new(CacheSettings { max_idle_ms: 5, capacity: 8 });
        let mut catalog = FakeCatalog::users();
        let table = cache.get_or_load(&key(), &mut catalog, 100).unwrap();

        assert_eq!(table.max_idle(), 5);
        assert!(cache.lookup(&key(), 105).is_some());
        assert!(cache.lookup(&key(), 106).is_none());
    }

    #[test]
    fn test_empty_table_name_rejected() {
        let cache = TableMetadataCache::default();
        let mut catalog = FakeCatalog::users();
        let err = cache
            .get_or_load(&TableKey::new("fake:", None, None, ""), &mut catalog, 0)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
        assert_eq!(catalog.column_calls, 0);
    }

    #[test]
    fn test_concurrent_distinct_keys() {
        let cache = TableMetadataCache::default();

        std::thread::scope(|scope| {
            for i in 0..8 {
                let cache = &cache;
                scope.spawn(move || {
                    let mut catalog = FakeCatalog::users();
                    let key = TableKey::new(format!("fake:{i}"), None, None, "users");
                    let table = cache.get_or_load(&key, &mut catalog, 0).unwrap();
                    assert_eq!(table.column_count(), 3);
                });
            }
        });

        for i in 0..8 {
            assert!(cache.lookup(&TableKey::new(format!("fake:{i}"), None, None, "users"), 0).is_some());
        }
    }
}
