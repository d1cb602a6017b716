//! Column metadata lookup against a catalog source.
//!
//! The column listing is mandatory: if it fails the table cannot be described
//! and the error is propagated. The primary-key and index listings only
//! refine flags. Some drivers cannot answer them, so their failures are
//! logged and the affected flags stay `false`.

use std::collections::HashMap;
use tracing::{debug, warn};

use super::column::{ColumnBuilder, ColumnDescriptor, ColumnType};
use super::table::TableKey;
use crate::error::Result;

/// One row of a "describe columns" catalog listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRow {
    pub name: String,
    pub column_type: ColumnType,
    /// Declared size (character length or numeric precision), 0 if unknown
    pub size: u32,
    pub nullable: bool,
    /// Raw catalog type name, e.g. `int(10) unsigned`
    pub type_name: String,
}

/// One column that takes part in an index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedColumn {
    pub column: String,
    pub unique: bool,
}

/// Outcome of an optional catalog listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogListing<T> {
    /// The catalog answered
    Listed(Vec<T>),
    /// The catalog has no way to answer this question
    Unsupported,
    /// The catalog should have answered but the call failed
    Failed(String),
}

/// Catalog capability of a database session
pub trait CatalogSource {
    /// List the columns of a table. Failure is fatal for the lookup.
    fn list_columns(&mut self, key: &TableKey) -> Result<Vec<ColumnRow>>;

    /// List the primary-key column names of a table
    fn list_primary_keys(&mut self, key: &TableKey) -> CatalogListing<String>;

    /// List the indexed columns of a table, excluding the primary key index
    fn list_indexed_columns(&mut self, key: &TableKey) -> CatalogListing<IndexedColumn>;
}

/// Build the column descriptors of one table.
pub fn describe_columns(
    source: &mut dyn CatalogSource,
    key: &TableKey,
) -> Result<Vec<ColumnDescriptor>> {
    let rows = source.list_columns(key)?;

    let mut builders: Vec<ColumnBuilder> = rows
        .into_iter()
        .map(|row| {
            ColumnBuilder::new(
                key.table.clone(),
                row.name,
                row.column_type,
                row.type_name,
                row.size,
                row.nullable,
            )
        })
        .collect();
    let positions: HashMap<String, usize> =
        builders.iter().enumerate().map(|(i, b)| (b.name().to_string(), i)).collect();

    if let Some(primary_keys) = optional_listing(key, "primary keys", source.list_primary_keys(key)) {
        for column in primary_keys {
            if let Some(&i) = positions.get(&column) {
                builders[i].mark_primary_key();
            }
        }
    }

    if let Some(indexed) = optional_listing(key, "indexes", source.list_indexed_columns(key)) {
        for entry in indexed {
            if let Some(&i) = positions.get(&entry.column) {
                builders[i].mark_index(entry.unique);
            }
        }
    }

    Ok(builders.into_iter().map(ColumnBuilder::build).collect())
}

fn optional_listing<T>(key: &TableKey, what: &str, listing: CatalogListing<T>) -> Option<Vec<T>> {
    match listing {
        CatalogListing::Listed(items) => Some(items),
        CatalogListing::Unsupported => {
            debug!(table = %key, "catalog does not list {what}");
            None
        }
        CatalogListing::Failed(detail) => {
            warn!(table = %key, "listing {what} failed, flags default to false: {detail}");
            None
        }
    }
}
