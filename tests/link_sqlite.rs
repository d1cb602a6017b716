//! Link Integration Tests over `SQLite`
//!
//! Exercises the full path a scripting-side adapter takes: a `Link` over a
//! real session, the shared metadata cache and its staleness window, DDL
//! driven invalidation, and the persistent link pool.
//!
//! Each test works on its own temporary database file.

#![cfg(feature = "sqlite")]

use std::path::PathBuf;
use std::sync::Arc;

use dbcompat::clock::ManualClock;
use dbcompat::{
    CacheSettings, ConnectionConfig, Link, LinkKey, LinkPool, TableKey, TableMetadataCache,
};
use pretty_assertions::assert_eq;
use serde_json::json;

// ============================================================================
// Test Helpers
// ============================================================================

/// Create a temporary database with a `users` table and two rows
fn create_test_db(name: &str) -> PathBuf {
    use rusqlite::{Connection, OpenFlags};
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let temp_file = std::env::temp_dir()
        .join(format!("dbcompat_{name}_{}_{id}.db", std::process::id()));
    let _ = std::fs::remove_file(&temp_file);

    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
    let conn = Connection::open_with_flags(&temp_file, flags).expect("Failed to create database");
    conn.execute_batch(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            name VARCHAR(64) NOT NULL,
            email TEXT UNIQUE
        );
        CREATE INDEX idx_users_name ON users(name);
        INSERT INTO users (name, email) VALUES ('Alice', 'alice@example.com');
        INSERT INTO users (name, email) VALUES ('Bob', NULL);",
    )
    .expect("Failed to create schema");

    temp_file
}

fn cleanup_db(path: &PathBuf) {
    let _ = std::fs::remove_file(path);
}

/// Open a link with a manual clock starting at zero
fn open_link(path: &PathBuf, cache: &TableMetadataCache) -> (Link, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0));
    let link = Link::connect(&ConnectionConfig::sqlite(path.clone()), cache.clone(), clock.clone())
        .expect("Failed to connect");
    (link, clock)
}

// ============================================================================
// Metadata
// ============================================================================

#[test]
fn test_table_metadata_key_flags() {
    let path = create_test_db("key_flags");
    let cache = TableMetadataCache::default();
    let (mut link, _clock) = open_link(&path, &cache);

    let table = link.table_metadata(None, None, "users").unwrap();
    assert_eq!(table.column_count(), 3);

    let id = table.column("id").unwrap();
    let name = table.column("name").unwrap();
    let email = table.column("email").unwrap();

    assert!(id.is_primary_key());
    assert!(!name.is_primary_key());
    assert!(name.is_not_null());
    assert!(name.is_index());
    assert!(!name.is_unique());
    assert_eq!(name.length(), 64);
    assert!(email.is_index());
    assert!(email.is_unique());
    assert!(!email.is_not_null());

    cleanup_db(&path);
}

#[test]
fn test_table_metadata_missing_table() {
    let path = create_test_db("missing_table");
    let cache = TableMetadataCache::default();
    let (mut link, _clock) = open_link(&path, &cache);

    let err = link.table_metadata(None, None, "no_such_table").unwrap_err();
    assert_eq!(err.error_code(), "CATALOG_ACCESS_FAILED");

    cleanup_db(&path);
}

#[test]
fn test_cached_instance_reused_until_window_elapses() {
    let path = create_test_db("staleness");
    let cache = TableMetadataCache::new(CacheSettings { max_idle_ms: 1_000, ..CacheSettings::default() });
    let (mut link, clock) = open_link(&path, &cache);

    let first = link.table_metadata(None, None, "users").unwrap();

    // schema change behind the link's back is not seen within the window
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute("ALTER TABLE users ADD COLUMN age INTEGER", []).unwrap();
    }

    clock.set(1_000);
    let second = link.table_metadata(None, None, "users").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.column_count(), 3);

    clock.set(1_001);
    let third = link.table_metadata(None, None, "users").unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(third.column_count(), 4);

    cleanup_db(&path);
}

#[test]
fn test_alter_through_link_invalidates_cache() {
    let path = create_test_db("alter_invalidates");
    let cache = TableMetadataCache::default();
    let (mut link, _clock) = open_link(&path, &cache);

    let before = link.table_metadata(None, None, "users").unwrap();
    link.query("ALTER TABLE users ADD COLUMN age INTEGER", &[]).unwrap();
    let after = link.table_metadata(None, None, "users").unwrap();

    assert!(!Arc::ptr_eq(&before, &after));
    assert!(after.column("age").is_some());

    cleanup_db(&path);
}

#[test]
fn test_cache_shared_between_links() {
    let path = create_test_db("shared_cache");
    let cache = TableMetadataCache::default();
    let (mut first, _) = open_link(&path, &cache);
    let (mut second, _) = open_link(&path, &cache);

    let a = first.table_metadata(None, None, "users").unwrap();
    let b = second.table_metadata(None, None, "users").unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    // DDL on one link drops the entry for every link sharing the cache
    second.query("DROP TABLE users", &[]).unwrap();
    let err = first.table_metadata(None, None, "users").unwrap_err();
    assert_eq!(err.error_code(), "CATALOG_ACCESS_FAILED");

    cleanup_db(&path);
}

// ============================================================================
// Statements
// ============================================================================

#[test]
fn test_query_with_parameters() {
    let path = create_test_db("params");
    let cache = TableMetadataCache::default();
    let (mut link, _clock) = open_link(&path, &cache);

    let result = link
        .query("SELECT name, email FROM users WHERE name = ? OR email = ?", &[json!("Bob"), json!("x")])
        .unwrap();

    let names: Vec<_> = result.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["name", "email"]);
    assert_eq!(result.rows, vec![vec![json!("Bob"), json!(null)]]);

    cleanup_db(&path);
}

#[test]
fn test_affected_rows_recorded() {
    let path = create_test_db("affected");
    let cache = TableMetadataCache::default();
    let (mut link, _clock) = open_link(&path, &cache);

    let statement = link.prepare("UPDATE users SET email = ? WHERE name <> ?").unwrap();
    let outcome = link.execute(&statement, &[json!("same@example.com"), json!("nobody")]);

    // UNIQUE(email) rejects the second row
    assert_eq!(outcome.unwrap_err().error_code(), "QUERY_FAILED");

    let outcome = link.execute(&statement, &[json!(null), json!("nobody")]).unwrap();
    assert_eq!(outcome.rows_affected, Some(2));
    assert_eq!(link.affected_rows(), Some(2));

    cleanup_db(&path);
}

#[test]
fn test_field_info_for_untracked_columns() {
    let path = create_test_db("field_info");
    let cache = TableMetadataCache::default();
    let (mut link, _clock) = open_link(&path, &cache);

    let result = link.query("SELECT COUNT(*) AS n FROM users", &[]).unwrap();
    let fields = link.fields(&result).unwrap();

    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].name, "n");
    assert_eq!(fields[0].table, "");
    assert!(fields[0].not_null);
    assert!(!fields[0].primary_key);

    assert_eq!(link.field_info(&result, 1).unwrap_err().error_code(), "INVALID_INPUT");

    cleanup_db(&path);
}

#[test]
fn test_field_info_uses_cached_table_metadata() {
    let path = create_test_db("field_keys");
    let cache = TableMetadataCache::default();
    let (mut link, _clock) = open_link(&path, &cache);

    let result = link.query("SELECT id, name AS label, email FROM users", &[]).unwrap();
    let fields = link.fields(&result).unwrap();

    let summary: Vec<_> = fields
        .iter()
        .map(|f| (f.name.as_str(), f.table.as_str(), f.primary_key, f.not_null))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("id", "users", true, false),
            ("label", "users", false, true),
            ("email", "users", false, false),
        ]
    );
    assert!(fields[1].multiple_key);
    assert!(fields[2].unique_key);

    // field info filled the shared cache
    let key = TableKey::new(link.url(), None, None, "users");
    assert!(cache.lookup(&key, 0).is_some());

    cleanup_db(&path);
}

// ============================================================================
// Link Pool
// ============================================================================

#[test]
fn test_pool_reuses_and_reconnects_after_create() {
    let path = create_test_db("pool");
    let cache = TableMetadataCache::default();
    let clock = Arc::new(ManualClock::new(0));
    let config = ConnectionConfig::sqlite(path.clone());
    let key = LinkKey::from_config(&config);
    let pool = LinkPool::new();

    let connect = || Link::connect(&config, cache.clone(), clock.clone());

    let first = pool.acquire(&key, false, connect).unwrap();
    let again = pool.acquire(&key, false, connect).unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    let fresh = pool.acquire(&key, true, connect).unwrap();
    assert!(!Arc::ptr_eq(&first, &fresh));
    assert_eq!(pool.len(), 1);

    first.lock().query("CREATE TABLE audit (id INTEGER PRIMARY KEY)", &[]).unwrap();
    assert!(!first.lock().is_reusable());

    let replaced = pool.acquire(&key, false, connect).unwrap();
    assert!(!Arc::ptr_eq(&first, &replaced));
    assert!(replaced.lock().is_reusable());

    cleanup_db(&path);
}
