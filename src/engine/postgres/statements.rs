//! Per-session prepared statement cache.
//!
//! Bounded, so a link running many distinct SQL texts keeps a fixed number of
//! server-side statements alive. An evicted `tokio_postgres::Statement` is
//! closed on the server when its last clone drops.

use moka::sync::Cache;

use crate::error::Result;

/// Prepared statements kept per session
pub const STATEMENT_CACHE_CAPACITY: u64 = 64;

pub struct StatementCache<S> {
    entries: Cache<String, S>,
}

impl<S: Clone + Send + Sync + 'static> StatementCache<S> {
    pub fn new(capacity: u64) -> Self {
        Self { entries: Cache::builder().max_capacity(capacity).build() }
    }

    /// The cached statement for `sql`, or the one `prepare` produces
    pub fn get_or_prepare<F>(&self, sql: &str, prepare: F) -> Result<S>
    where
        F: FnOnce() -> Result<S>,
    {
        if let Some(statement) = self.entries.get(sql) {
            return Ok(statement);
        }

        let statement = prepare()?;
        self.entries.insert(sql.to_string(), statement.clone());
        Ok(statement)
    }

    /// Entries currently held, after pending evictions are applied
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }
}
