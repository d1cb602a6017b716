//! `PostgreSQL` Session
//!
//! # Features
//! - Client-server connections via TCP
//! - Catalog via `information_schema.columns` and `pg_index`
//! - Result columns carry their source table (`pg_field_table`)
//!
//! # Implementation Notes
//! - Uses `tokio-postgres` (async driver, requires tokio runtime)
//! - Async operations are wrapped in synchronous interface
//! - Canonical `?` placeholders are numbered back to `$n` before preparing
//! - Prepared statements are cached per session up to a fixed bound
//! - Parameters are sent in text format, as the PHP pg extension does;
//!   BYTEA parameters are Base64-decoded and sent binary
//! - JSON/JSONB preserved as nested JSON
//! - BYTEA data is Base64-encoded for JSON safety

use bytes::BytesMut;
use std::collections::HashMap;
use tokio::runtime::Runtime;
use tokio_postgres::types::{to_sql_checked, Format, IsNull, ToSql, Type};
use tokio_postgres::{Client, Config, NoTls, Row, Statement};
use tracing::debug;

use crate::engine::{runtime, ConnectionConfig, DatabaseType};
use crate::error::{CompatError, Result};
use crate::metadata::{CatalogListing, CatalogSource, ColumnRow, ColumnType, IndexedColumn, TableKey};
use crate::statement::{ExecOutcome, ResultColumn, SqlSession, StatementHandle};

mod statements;

use statements::{StatementCache, STATEMENT_CACHE_CAPACITY};

/// `PostgreSQL` session over one client connection
pub struct PostgresSession {
    runtime: Runtime,
    client: Client,
    url: String,
    statements: StatementCache<Statement>,
    tables: HashMap<u32, (String, String)>,
}

impl PostgresSession {
    pub fn open(config: &ConnectionConfig) -> Result<Self> {
        if config.engine != DatabaseType::Postgres {
            return Err(CompatError::invalid_input(format!(
                "Expected PostgreSQL engine, got {}",
                config.engine
            )));
        }

        let pg_config = build_pg_config(config)?;
        let runtime = runtime::current_thread("postgres")?;

        let (client, connection) = runtime.block_on(pg_config.connect(NoTls)).map_err(|e| {
            CompatError::connection_failed(format!("Failed to connect to PostgreSQL: {e}"))
        })?;

        // Note: Connection errors are not logged to prevent credential leakage
        runtime.spawn(async move {
            let _ = connection.await;
        });

        debug!(url = %config.url(), "opened postgres session");

        Ok(Self {
            runtime,
            client,
            url: config.url(),
            statements: StatementCache::new(STATEMENT_CACHE_CAPACITY),
            tables: HashMap::new(),
        })
    }

    fn statement(&self, sql: &str) -> Result<Statement> {
        self.statements.get_or_prepare(sql, || {
            let numbered = number_placeholders(sql);
            self.runtime
                .block_on(self.client.prepare(&numbered))
                .map_err(|e| CompatError::query_failed(format!("Failed to prepare query: {e}")))
        })
    }

    /// `(schema, table)` for a result column's table OID
    fn table_of(&mut self, oid: u32) -> Option<(String, String)> {
        if let Some(found) = self.tables.get(&oid) {
            return Some(found.clone());
        }

        let query = "
            SELECT n.nspname::text, c.relname::text
            FROM pg_class c
            JOIN pg_namespace n ON n.oid = c.relnamespace
            WHERE c.oid = $1";

        let row = self.runtime.block_on(self.client.query_opt(query, &[&oid])).ok()??;
        let found: (String, String) = (row.get(0), row.get(1));
        self.tables.insert(oid, found.clone());
        Some(found)
    }

    fn query_catalog(&self, query: &str, key: &TableKey) -> std::result::Result<Vec<Row>, tokio_postgres::Error> {
        let schema = key.schema.as_deref();
        let table = key.table.as_str();
        self.runtime.block_on(self.client.query(query, &[&schema, &table]))
    }
}

fn build_pg_config(config: &ConnectionConfig) -> Result<Config> {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port.unwrap_or(5432);

    let user = config
        .user
        .as_ref()
        .ok_or_else(|| CompatError::invalid_input("PostgreSQL requires 'user' parameter"))?;

    let database = config
        .database
        .as_ref()
        .ok_or_else(|| CompatError::invalid_input("PostgreSQL requires 'database' parameter"))?;

    let mut pg_config = Config::new();
    pg_config.host(host).port(port).user(user).dbname(database);
    if let Some(password) = &config.password {
        pg_config.password(password);
    }

    Ok(pg_config)
}

/// Rewrite canonical `?` placeholders to `$1`, `$2`, ... outside quoted text
fn number_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut quote: Option<char> = None;
    let mut next = 1;

    for ch in sql.chars() {
        match (quote, ch) {
            (None, '\'' | '"') => {
                quote = Some(ch);
                out.push(ch);
            }
            (Some(q), c) if c == q => {
                quote = None;
                out.push(ch);
            }
            (None, '?') => {
                out.push('$');
                out.push_str(&next.to_string());
                next += 1;
            }
            _ => out.push(ch),
        }
    }

    out
}

/// Parameter sent in text format; the server parses it per declared type
#[derive(Debug)]
struct TextParam(String);

impl ToSql for TextParam {
    fn to_sql(
        &self,
        _ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        out.extend_from_slice(self.0.as_bytes());
        Ok(IsNull::No)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}

type Param = Box<dyn ToSql + Sync>;

fn json_to_param(value: &serde_json::Value, ty: &Type) -> Result<Param> {
    use serde_json::Value;

    let param: Param = match (value, ty) {
        (Value::Null, &Type::BYTEA) => Box::new(None::<Vec<u8>>),
        (Value::Null, _) => Box::new(None::<TextParam>),
        (Value::String(s), &Type::BYTEA) => {
            use base64::Engine;
            let bytes = base64::engine::general_purpose::STANDARD.decode(s).map_err(|e| {
                CompatError::invalid_input(format!("BYTEA parameter is not Base64: {e}"))
            })?;
            Box::new(bytes)
        }
        (Value::Bool(b), &Type::BOOL) => Box::new(TextParam(if *b { "t" } else { "f" }.into())),
        (Value::String(s), _) => Box::new(TextParam(s.clone())),
        (other, _) => Box::new(TextParam(other.to_string())),
    };

    Ok(param)
}

impl SqlSession for PostgresSession {
    fn engine(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn prepare(&mut self, sql: &str) -> Result<StatementHandle> {
        let statement = self.statement(sql)?;
        Ok(StatementHandle::new(sql, Some(statement.params().len())))
    }

    fn execute(&mut self, handle: &StatementHandle, params: &[serde_json::Value]) -> Result<ExecOutcome> {
        let statement = self.statement(handle.sql())?;

        if params.len() != statement.params().len() {
            return Err(CompatError::invalid_input(format!(
                "Statement expects {} parameter(s), {} bound",
                statement.params().len(),
                params.len()
            )));
        }

        let bound = params
            .iter()
            .zip(statement.params())
            .map(|(value, ty)| json_to_param(value, ty))
            .collect::<Result<Vec<Param>>>()?;
        let refs: Vec<&(dyn ToSql + Sync)> = bound.iter().map(|p| &**p as &(dyn ToSql + Sync)).collect();

        if statement.columns().is_empty() {
            let affected = self
                .runtime
                .block_on(self.client.execute(&statement, &refs))
                .map_err(|e| CompatError::query_failed(format!("Failed to execute query: {e}")))?;

            return Ok(ExecOutcome { columns: Vec::new(), rows: Vec::new(), rows_affected: Some(affected) });
        }

        let rows = self
            .runtime
            .block_on(self.client.query(&statement, &refs))
            .map_err(|e| CompatError::query_failed(format!("Failed to execute query: {e}")))?;

        let mut columns = Vec::with_capacity(statement.columns().len());
        for column in statement.columns() {
            let mut result = ResultColumn::named(column.name()).with_type_name(column.type_().name());
            if let Some((schema, table)) = column.table_oid().and_then(|oid| self.table_of(oid)) {
                result = result.from_table(Some(schema.as_str()), &table);
            }
            columns.push(result);
        }

        let rows = rows.iter().map(row_to_json).collect::<Result<Vec<_>>>()?;

        Ok(ExecOutcome { columns, rows, rows_affected: None })
    }
}

impl CatalogSource for PostgresSession {
    fn list_columns(&mut self, key: &TableKey) -> Result<Vec<ColumnRow>> {
        let query = "
            SELECT column_name::text, udt_name::text, is_nullable::text,
                   COALESCE(character_maximum_length, numeric_precision, 0)::int4
            FROM information_schema.columns
            WHERE table_schema::text = COALESCE($1, current_schema()::text)
              AND table_name::text = $2
            ORDER BY ordinal_position";

        let rows = self
            .query_catalog(query, key)
            .map_err(|e| CompatError::catalog_access(key.to_string(), e.to_string()))?;

        if rows.is_empty() {
            return Err(CompatError::catalog_access(key.to_string(), "no such table"));
        }

        Ok(rows
            .iter()
            .map(|row| {
                let type_name: String = row.get(1);
                let is_nullable: String = row.get(2);
                let size: i32 = row.get(3);
                ColumnRow {
                    name: row.get(0),
                    column_type: ColumnType::from_type_name(&type_name),
                    size: u32::try_from(size).unwrap_or(0),
                    nullable: is_nullable == "YES",
                    type_name,
                }
            })
            .collect())
    }

    fn list_primary_keys(&mut self, key: &TableKey) -> CatalogListing<String> {
        let query = "
            SELECT a.attname::text
            FROM pg_index i
            JOIN pg_class c ON c.oid = i.indrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
            WHERE n.nspname = COALESCE($1, current_schema()) AND c.relname = $2
              AND i.indisprimary";

        match self.query_catalog(query, key) {
            Ok(rows) => CatalogListing::Listed(rows.iter().map(|row| row.get(0)).collect()),
            Err(e) => CatalogListing::Failed(e.to_string()),
        }
    }

    fn list_indexed_columns(&mut self, key: &TableKey) -> CatalogListing<IndexedColumn> {
        let query = "
            SELECT a.attname::text, i.indisunique
            FROM pg_index i
            JOIN pg_class c ON c.oid = i.indrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
            WHERE n.nspname = COALESCE($1, current_schema()) AND c.relname = $2
              AND NOT i.indisprimary";

        match self.query_catalog(query, key) {
            Ok(rows) => CatalogListing::Listed(
                rows.iter().map(|row| IndexedColumn { column: row.get(0), unique: row.get(1) }).collect(),
            ),
            Err(e) => CatalogListing::Failed(e.to_string()),
        }
    }
}

/// Convert a `PostgreSQL` row to a JSON-safe `Vec`
fn row_to_json(row: &Row) -> Result<Vec<serde_json::Value>> {
    (0..row.len()).map(|idx| postgres_value_to_json(row, idx)).collect()
}

fn get<'a, T: tokio_postgres::types::FromSql<'a>>(row: &'a Row, idx: usize) -> Result<Option<T>> {
    row.try_get(idx).map_err(|e| {
        CompatError::query_failed(format!(
            "Failed to read column {idx} ({}): {e}",
            row.columns()[idx].type_().name()
        ))
    })
}

/// Convert `PostgreSQL` value to JSON value
fn postgres_value_to_json(row: &Row, idx: usize) -> Result<serde_json::Value> {
    use serde_json::Value;

    let col_type = row.columns()[idx].type_();

    let value = match *col_type {
        Type::BOOL => get::<bool>(row, idx)?.map(Value::Bool),
        Type::INT2 => get::<i16>(row, idx)?.map(|v| Value::Number(v.into())),
        Type::INT4 => get::<i32>(row, idx)?.map(|v| Value::Number(v.into())),
        Type::INT8 => get::<i64>(row, idx)?.map(|v| Value::Number(v.into())),
        Type::OID => get::<u32>(row, idx)?.map(|v| Value::Number(v.into())),
        Type::FLOAT4 => get::<f32>(row, idx)?
            .map(|v| serde_json::Number::from_f64(f64::from(v)).map_or(Value::Null, Value::Number)),
        Type::FLOAT8 => {
            get::<f64>(row, idx)?.map(|v| serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number))
        }
        Type::JSON | Type::JSONB => get::<Value>(row, idx)?,
        Type::BYTEA => get::<Vec<u8>>(row, idx)?.map(|v| {
            use base64::Engine;
            Value::String(base64::engine::general_purpose::STANDARD.encode(v))
        }),
        Type::TIMESTAMP => get::<chrono::NaiveDateTime>(row, idx)?
            .map(|v| Value::String(v.format("%Y-%m-%d %H:%M:%S%.f").to_string())),
        Type::TIMESTAMPTZ => {
            get::<chrono::DateTime<chrono::Utc>>(row, idx)?.map(|v| Value::String(v.to_rfc3339()))
        }
        Type::DATE => {
            get::<chrono::NaiveDate>(row, idx)?.map(|v| Value::String(v.format("%Y-%m-%d").to_string()))
        }
        Type::TIME => {
            get::<chrono::NaiveTime>(row, idx)?.map(|v| Value::String(v.format("%H:%M:%S%.f").to_string()))
        }
        Type::UUID => get::<uuid::Uuid>(row, idx)?.map(|v| Value::String(v.to_string())),
        // Text types and anything else with a text representation
        _ => get::<String>(row, idx)?.map(Value::String),
    };

    Ok(value.unwrap_or(Value::Null))
}
