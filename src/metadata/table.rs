//! Per-table metadata with a staleness window.

use serde::Serialize;

use super::column::ColumnDescriptor;

/// Default staleness window in milliseconds
pub const DEFAULT_MAX_IDLE_MS: u64 = 10_000;

/// Cache key for one table.
///
/// `url` identifies the database the session is attached to, so equally named
/// tables in two databases never share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TableKey {
    pub url: String,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub table: String,
}

impl TableKey {
    pub fn new(
        url: impl Into<String>,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            catalog: catalog.map(str::to_string),
            schema: schema.map(str::to_string),
            table: table.into(),
        }
    }
}

impl std::fmt::Display for TableKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for part in [&self.catalog, &self.schema].into_iter().flatten() {
            write!(f, "{part}.")?;
        }
        write!(f, "{}", self.table)
    }
}

/// Column descriptors of one table in catalog order, stamped with their
/// creation time
#[derive(Debug, Clone, Serialize)]
pub struct TableDescriptor {
    catalog: Option<String>,
    schema: Option<String>,
    name: String,
    columns: Vec<ColumnDescriptor>,
    created_at: u64,
    max_idle: u64,
}

impl TableDescriptor {
    pub fn new(
        catalog: Option<String>,
        schema: Option<String>,
        name: impl Into<String>,
        columns: impl IntoIterator<Item = ColumnDescriptor>,
        created_at: u64,
        max_idle: u64,
    ) -> Self {
        Self {
            catalog,
            schema,
            name: name.into(),
            columns: columns.into_iter().collect(),
            created_at,
            max_idle,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    #[must_use]
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter()
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub const fn created_at(&self) -> u64 {
        self.created_at
    }

    #[must_use]
    pub const fn max_idle(&self) -> u64 {
        self.max_idle
    }

    /// True while `now - created_at <= max_idle`.
    ///
    /// A `now` earlier than `created_at` counts as fresh.
    #[must_use]
    pub const fn is_valid(&self, now: u64) -> bool {
        now.saturating_sub(self.created_at) <= self.max_idle
    }
}
