//! Table and Column Metadata
//!
//! Result formatting (`mysqli_fetch_field`, `pg_field_*`) needs column
//! attributes the result set alone does not carry: key membership, declared
//! length, unsigned/zero-fill modifiers. This module builds them from catalog
//! queries and caches them per table.
//!
//! # Module Organization
//! - [`column`] - Type codes, column descriptors, MySQL field flags
//! - [`table`] - Table descriptors and their staleness window
//! - [`lookup`] - The catalog capability and the describe-columns lookup
//! - [`cache`] - The shared, bounded, staleness-checked cache

pub mod cache;
pub mod column;
pub mod lookup;
pub mod table;

pub use cache::{CacheSettings, TableMetadataCache};
pub use column::{ColumnBuilder, ColumnDescriptor, ColumnType, FieldFlags};
pub use lookup::{describe_columns, CatalogListing, CatalogSource, ColumnRow, IndexedColumn};
pub use table::{TableDescriptor, TableKey, DEFAULT_MAX_IDLE_MS};
