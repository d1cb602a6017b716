//! `SQLite` Session
//!
//! # Features
//! - File-based connections (`/path/to/db.sqlite`)
//! - In-memory connections (`:memory:`)
//! - Catalog via `PRAGMA table_info / index_list / index_info`
//! - Result columns carry their source table and column (column metadata)
//!
//! # Implementation Notes
//! - Uses `rusqlite` (synchronous driver, no async needed)
//! - BLOB data is Base64-encoded for JSON safety
//! - `TableKey::schema` names an attached database (`main`, `temp`, ...)

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags, Row, Statement};
use serde_json::Value;
use tracing::debug;

use crate::engine::{ConnectionConfig, DatabaseType};
use crate::error::{CompatError, Result};
use crate::metadata::{CatalogListing, CatalogSource, ColumnRow, ColumnType, IndexedColumn, TableKey};
use crate::statement::{ExecOutcome, ResultColumn, SqlSession, StatementHandle};

/// `SQLite` session over one connection
pub struct SqliteSession {
    conn: Connection,
    url: String,
}

impl SqliteSession {
    /// Open the database file named by `config.file`
    pub fn open(config: &ConnectionConfig) -> Result<Self> {
        if config.engine != DatabaseType::SQLite {
            return Err(CompatError::invalid_input(format!(
                "Expected SQLite engine, got {}",
                config.engine
            )));
        }

        let file_path = config
            .file
            .as_ref()
            .ok_or_else(|| CompatError::invalid_input("SQLite requires 'file' parameter"))?;

        let path_str = file_path.to_str().ok_or_else(|| {
            CompatError::invalid_input("SQLite file path contains invalid UTF-8 characters")
        })?;

        let conn = open_connection(path_str)?;
        debug!(file = path_str, "opened sqlite session");

        Ok(Self { conn, url: config.url() })
    }
}

/// Open `SQLite` connection, creating the file if needed
fn open_connection(path: &str) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;

    Connection::open_with_flags(path, flags)
        .map_err(|e| CompatError::connection_failed(format!("Failed to open SQLite database: {e}")))
}

impl SqlSession for SqliteSession {
    fn engine(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn prepare(&mut self, sql: &str) -> Result<StatementHandle> {
        let stmt = self
            .conn
            .prepare_cached(sql)
            .map_err(|e| CompatError::query_failed(format!("Failed to prepare query: {e}")))?;
        Ok(StatementHandle::new(sql, Some(stmt.parameter_count())))
    }

    fn execute(&mut self, statement: &StatementHandle, params: &[Value]) -> Result<ExecOutcome> {
        let mut stmt = self
            .conn
            .prepare_cached(statement.sql())
            .map_err(|e| CompatError::query_failed(format!("Failed to prepare query: {e}")))?;

        let bound = params.iter().map(json_to_sqlite).collect::<Vec<_>>();

        let columns = result_columns(&stmt);

        if columns.is_empty() {
            // Non-SELECT query (INSERT, UPDATE, DELETE, DDL)
            let changed = stmt
                .execute(params_from_iter(bound))
                .map_err(|e| CompatError::query_failed(format!("Failed to execute query: {e}")))?;

            return Ok(ExecOutcome {
                columns: Vec::new(),
                rows: Vec::new(),
                rows_affected: Some(changed as u64),
            });
        }

        let rows = stmt
            .query(params_from_iter(bound))
            .map_err(|e| CompatError::query_failed(format!("Failed to execute query: {e}")))?
            .mapped(|row| row_to_json(columns.len(), row))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| CompatError::query_failed(format!("Failed to fetch row: {e}")))?;

        Ok(ExecOutcome { columns, rows, rows_affected: None })
    }
}

/// Result columns with the table and column each one reads from.
///
/// The `main` database maps to no schema so cache keys match lookups made
/// without one.
fn result_columns(stmt: &Statement<'_>) -> Vec<ResultColumn> {
    stmt.columns_with_metadata()
        .iter()
        .map(|meta| {
            let column = ResultColumn::named(meta.name());
            match meta.table_name() {
                Some(table) => column
                    .from_table(meta.database_name().filter(|db| *db != "main"), table)
                    .with_origin(meta.origin_name().unwrap_or_default()),
                None => column,
            }
        })
        .collect()
}

impl CatalogSource for SqliteSession {
    fn list_columns(&mut self, key: &TableKey) -> Result<Vec<ColumnRow>> {
        let rows = table_info(&self.conn, key)
            .map_err(|e| CompatError::catalog_access(key.to_string(), e.to_string()))?;

        if rows.is_empty() {
            return Err(CompatError::catalog_access(key.to_string(), "no such table"));
        }

        Ok(rows
            .into_iter()
            .map(|info| ColumnRow {
                column_type: ColumnType::from_type_name(&info.type_name),
                size: declared_size(&info.type_name),
                nullable: !info.not_null,
                name: info.name,
                type_name: info.type_name,
            })
            .collect())
    }

    fn list_primary_keys(&mut self, key: &TableKey) -> CatalogListing<String> {
        match table_info(&self.conn, key) {
            Ok(rows) => CatalogListing::Listed(
                rows.into_iter().filter(|info| info.pk > 0).map(|info| info.name).collect(),
            ),
            Err(e) => CatalogListing::Failed(e.to_string()),
        }
    }

    fn list_indexed_columns(&mut self, key: &TableKey) -> CatalogListing<IndexedColumn> {
        match indexed_columns(&self.conn, key) {
            Ok(columns) => CatalogListing::Listed(columns),
            Err(e) => CatalogListing::Failed(e.to_string()),
        }
    }
}

/// One row of `PRAGMA table_info`
struct TableInfoRow {
    name: String,
    type_name: String,
    not_null: bool,
    pk: i32,
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `PRAGMA [schema.]name(table)`
fn pragma(key: &TableKey, name: &str, arg: &str) -> String {
    match key.schema.as_deref() {
        Some(schema) => format!("PRAGMA {}.{name}({})", quote_ident(schema), quote_ident(arg)),
        None => format!("PRAGMA {name}({})", quote_ident(arg)),
    }
}

fn table_info(conn: &Connection, key: &TableKey) -> rusqlite::Result<Vec<TableInfoRow>> {
    let mut stmt = conn.prepare(&pragma(key, "table_info", &key.table))?;
    let rows = stmt.query_map([], |row| {
        Ok(TableInfoRow {
            name: row.get(1)?,
            type_name: row.get(2)?,
            not_null: row.get::<_, i32>(3)? != 0,
            pk: row.get(5)?,
        })
    })?;
    rows.collect()
}

fn indexed_columns(conn: &Connection, key: &TableKey) -> rusqlite::Result<Vec<IndexedColumn>> {
    let mut stmt = conn.prepare(&pragma(key, "index_list", &key.table))?;
    let indexes = stmt
        .query_map([], |row| {
            let name: String = row.get(1)?;
            let unique: i32 = row.get(2)?;
            let origin: String = row.get(3)?;
            Ok((name, unique != 0, origin))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut columns = Vec::new();
    for (index_name, unique, origin) in indexes {
        // the primary key's own index is reported through list_primary_keys
        if origin == "pk" {
            continue;
        }

        let mut info = conn.prepare(&pragma(key, "index_info", &index_name))?;
        let names = info
            .query_map([], |row| row.get::<_, Option<String>>(2))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        // expression index entries have no column name
        columns.extend(names.into_iter().flatten().map(|column| IndexedColumn { column, unique }));
    }

    Ok(columns)
}

/// Size from a declared type such as `VARCHAR(64)` or `DECIMAL(10,2)`, else 0
fn declared_size(type_name: &str) -> u32 {
    type_name
        .split_once('(')
        .and_then(|(_, rest)| rest.split(|c| c == ',' || c == ')').next())
        .and_then(|n| n.trim().parse().ok())
        .unwrap_or(0)
}

fn json_to_sqlite(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real))
            .unwrap_or(SqlValue::Null),
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Convert a `SQLite` row to a JSON-safe `Vec`
fn row_to_json(column_count: usize, row: &Row) -> std::result::Result<Vec<Value>, rusqlite::Error> {
    (0..column_count).map(|idx| sqlite_value_to_json(row, idx)).collect()
}

/// Convert `SQLite` value to JSON value
fn sqlite_value_to_json(row: &Row, idx: usize) -> std::result::Result<Value, rusqlite::Error> {
    let value_ref = row.get_ref(idx)?;

    Ok(match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number), // Handle NaN/Infinity as null
        ValueRef::Text(s) => {
            let text = std::str::from_utf8(s).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;
            Value::String(text.to_string())
        }
        ValueRef::Blob(b) => {
            // Encode BLOB as Base64 for JSON safety
            use base64::Engine;
            Value::String(base64::engine::general_purpose::STANDARD.encode(b))
        }
    })
}
