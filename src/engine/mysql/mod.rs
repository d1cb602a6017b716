//! MySQL Session
//!
//! # Features
//! - Client-server connections via TCP (MySQL and MariaDB)
//! - Catalog via `information_schema.COLUMNS / KEY_COLUMN_USAGE / STATISTICS`
//! - SQL text, catalog names and result text use the configured charset
//!   (latin1 uses the CP1252-overlay codec)
//!
//! # Implementation Notes
//! - Uses `mysql_async` (async driver, requires tokio runtime)
//! - Async operations are wrapped in synchronous interface
//! - Statements are prepared through the driver's per-connection statement
//!   cache on every call; no handle outlives it
//! - Binary-collation columns are Base64-encoded for JSON safety
//! - `TableKey` catalog (or schema) names the database; the current one
//!   when unset

use mysql_async::consts::ColumnType as MyColumnType;
use mysql_async::{prelude::*, Column, Conn, OptsBuilder, Params, Row, Statement, Value};
use tokio::runtime::Runtime;
use tracing::debug;

use crate::charset::{self, Charset};
use crate::engine::{runtime, ConnectionConfig, DatabaseType};
use crate::error::{CompatError, Result};
use crate::metadata::{CatalogListing, CatalogSource, ColumnRow, ColumnType, IndexedColumn, TableKey};
use crate::statement::{ExecOutcome, ResultColumn, SqlSession, StatementHandle};

/// Collation id MySQL reports for binary strings
const BINARY_CHARSET: u16 = 63;

/// MySQL session over one connection
pub struct MySqlSession {
    runtime: Runtime,
    conn: Conn,
    url: String,
    charset: Charset,
}

impl MySqlSession {
    pub fn open(config: &ConnectionConfig) -> Result<Self> {
        if config.engine != DatabaseType::MySQL {
            return Err(CompatError::invalid_input(format!(
                "Expected MySQL engine, got {}",
                config.engine
            )));
        }

        let charset = config.resolve_charset()?;
        let opts = build_mysql_opts(config)?;
        let runtime = runtime::current_thread("mysql")?;

        let mut conn = runtime.block_on(Conn::new(opts)).map_err(|e| {
            CompatError::connection_failed(format!("Failed to connect to MySQL: {e}"))
        })?;

        if charset == Charset::Latin1 {
            runtime.block_on(conn.query_drop("SET NAMES latin1")).map_err(|e| {
                CompatError::engine_error("mysql", format!("Failed to select latin1: {e}"))
            })?;
        }

        debug!(url = %config.url(), ?charset, "opened mysql session");

        Ok(Self { runtime, conn, url: config.url(), charset })
    }

    fn statement(&mut self, sql: &str) -> Result<Statement> {
        let text = encode_text(self.charset, sql)?;
        self.runtime
            .block_on(self.conn.prep(text))
            .map_err(|e| CompatError::query_failed(format!("Failed to prepare query: {e}")))
    }

    /// Turn a JSON parameter into a MySQL value, encoding text in the
    /// session charset
    fn to_param(&self, value: &serde_json::Value) -> Result<Value> {
        use serde_json::Value as Json;

        Ok(match value {
            Json::Null => Value::NULL,
            Json::Bool(b) => Value::Int(i64::from(*b)),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Double(n.as_f64().unwrap_or_default())
                }
            }
            Json::String(s) => Value::Bytes(encode_text(self.charset, s)?),
            other => Value::Bytes(encode_text(self.charset, &other.to_string())?),
        })
    }

    /// Rows of a catalog query taking `(database, table)`, names sent in the
    /// session charset
    fn catalog_rows(&mut self, query: &str, key: &TableKey) -> Result<Vec<Row>> {
        let catalog_error = |e: CompatError| CompatError::catalog_access(key.to_string(), e.message());
        let database = key
            .catalog
            .as_deref()
            .or(key.schema.as_deref())
            .map(|name| encode_text(self.charset, name))
            .transpose()
            .map_err(catalog_error)?;
        let table = encode_text(self.charset, &key.table).map_err(catalog_error)?;

        self.runtime
            .block_on(self.conn.exec(query, (database, table)))
            .map_err(|e| CompatError::catalog_access(key.to_string(), e.to_string()))
    }
}

/// Bytes of SQL text or a name as the server expects them on this session
fn encode_text(charset: Charset, text: &str) -> Result<Vec<u8>> {
    match charset {
        Charset::Latin1 => charset::encode(text),
        Charset::Utf8 | Charset::Binary => Ok(text.as_bytes().to_vec()),
    }
}

/// Names and catalog text the server sends on this session
fn decode_text(charset: Charset, bytes: &[u8]) -> String {
    match charset {
        Charset::Latin1 => charset::decode(bytes),
        Charset::Utf8 | Charset::Binary => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Text of one catalog value; `None` for NULL or a missing column
fn catalog_text(value: Option<&Value>, charset: Charset) -> Option<String> {
    match value? {
        Value::Bytes(bytes) => Some(decode_text(charset, bytes)),
        Value::Int(i) => Some(i.to_string()),
        Value::UInt(u) => Some(u.to_string()),
        _ => None,
    }
}

/// Integer catalog value, sent binary or as decimal text
fn catalog_number(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Int(i) => Some(*i),
        Value::UInt(u) => i64::try_from(*u).ok(),
        Value::Bytes(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
        _ => None,
    }
}

/// One `information_schema.COLUMNS` row
fn column_row(row: &Row, charset: Charset) -> std::result::Result<ColumnRow, String> {
    let text = |idx: usize, field: &str| {
        catalog_text(row.as_ref(idx), charset).ok_or_else(|| format!("unreadable {field} in catalog row"))
    };

    let data_type = text(1, "DATA_TYPE")?;
    Ok(ColumnRow {
        name: text(0, "COLUMN_NAME")?,
        column_type: ColumnType::from_type_name(&data_type),
        size: catalog_number(row.as_ref(4)).map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX)),
        nullable: text(3, "IS_NULLABLE")? == "YES",
        type_name: text(2, "COLUMN_TYPE")?,
    })
}

/// Build MySQL connection options from ConnectionConfig
fn build_mysql_opts(config: &ConnectionConfig) -> Result<OptsBuilder> {
    let host = config
        .host
        .as_ref()
        .ok_or_else(|| CompatError::invalid_input("MySQL requires 'host' parameter"))?;

    let user = config
        .user
        .as_ref()
        .ok_or_else(|| CompatError::invalid_input("MySQL requires 'user' parameter"))?;

    let opts = OptsBuilder::default()
        .ip_or_hostname(host)
        .tcp_port(config.port.unwrap_or(3306))
        .user(Some(user))
        .pass(config.password.as_ref())
        .db_name(config.database.as_ref());

    Ok(opts)
}

impl SqlSession for MySqlSession {
    fn engine(&self) -> DatabaseType {
        DatabaseType::MySQL
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn prepare(&mut self, sql: &str) -> Result<StatementHandle> {
        let statement = self.statement(sql)?;
        Ok(StatementHandle::new(sql, Some(usize::from(statement.num_params()))))
    }

    fn execute(&mut self, handle: &StatementHandle, params: &[serde_json::Value]) -> Result<ExecOutcome> {
        let statement = self.statement(handle.sql())?;

        let values = params.iter().map(|v| self.to_param(v)).collect::<Result<Vec<_>>>()?;
        let params = if values.is_empty() { Params::Empty } else { Params::Positional(values) };

        if statement.columns().is_empty() {
            self.runtime
                .block_on(self.conn.exec_drop(&statement, params))
                .map_err(|e| CompatError::query_failed(format!("Failed to execute query: {e}")))?;

            return Ok(ExecOutcome {
                columns: Vec::new(),
                rows: Vec::new(),
                rows_affected: Some(self.conn.affected_rows()),
            });
        }

        let rows: Vec<Row> = self
            .runtime
            .block_on(self.conn.exec(&statement, params))
            .map_err(|e| CompatError::query_failed(format!("Failed to execute query: {e}")))?;

        let columns = statement.columns().iter().map(|c| result_column(c, self.charset)).collect();
        let rows = rows
            .iter()
            .map(|row| row_to_json(row, statement.columns(), self.charset))
            .collect::<Result<Vec<_>>>()?;

        Ok(ExecOutcome { columns, rows, rows_affected: None })
    }
}

impl CatalogSource for MySqlSession {
    fn list_columns(&mut self, key: &TableKey) -> Result<Vec<ColumnRow>> {
        let query = "
            SELECT COLUMN_NAME, DATA_TYPE, COLUMN_TYPE, IS_NULLABLE,
                   CAST(COALESCE(CHARACTER_MAXIMUM_LENGTH, NUMERIC_PRECISION, 0) AS UNSIGNED)
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION";

        let rows = self.catalog_rows(query, key)?;

        if rows.is_empty() {
            return Err(CompatError::catalog_access(key.to_string(), "no such table"));
        }

        rows.iter()
            .map(|row| column_row(row, self.charset))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|detail| CompatError::catalog_access(key.to_string(), detail))
    }

    fn list_primary_keys(&mut self, key: &TableKey) -> CatalogListing<String> {
        let query = "
            SELECT COLUMN_NAME
            FROM information_schema.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?
              AND CONSTRAINT_NAME = 'PRIMARY'
            ORDER BY ORDINAL_POSITION";

        let rows = match self.catalog_rows(query, key) {
            Ok(rows) => rows,
            Err(e) => return CatalogListing::Failed(e.message()),
        };

        rows.iter()
            .map(|row| catalog_text(row.as_ref(0), self.charset))
            .collect::<Option<Vec<_>>>()
            .map_or_else(|| CatalogListing::Failed("unreadable COLUMN_NAME in catalog row".into()), CatalogListing::Listed)
    }

    fn list_indexed_columns(&mut self, key: &TableKey) -> CatalogListing<IndexedColumn> {
        let query = "
            SELECT COLUMN_NAME, NON_UNIQUE
            FROM information_schema.STATISTICS
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?
              AND INDEX_NAME <> 'PRIMARY'";

        let rows = match self.catalog_rows(query, key) {
            Ok(rows) => rows,
            Err(e) => return CatalogListing::Failed(e.message()),
        };

        rows.iter()
            .map(|row| {
                let column = catalog_text(row.as_ref(0), self.charset)?;
                let non_unique = catalog_number(row.as_ref(1))?;
                Some(IndexedColumn { column, unique: non_unique == 0 })
            })
            .collect::<Option<Vec<_>>>()
            .map_or_else(|| CatalogListing::Failed("unreadable STATISTICS row".into()), CatalogListing::Listed)
    }
}

fn result_column(column: &Column, charset: Charset) -> ResultColumn {
    let schema = decode_text(charset, column.schema_ref());
    ResultColumn::named(decode_text(charset, column.name_ref()))
        .from_table(Some(schema.as_str()), &decode_text(charset, column.org_table_ref()))
        .with_origin(&decode_text(charset, column.org_name_ref()))
        .with_type_name(type_name(column))
}

/// MySQL type name for a result column, as `mysqli_fetch_field` spells it
fn type_name(column: &Column) -> &'static str {
    let binary = column.character_set() == BINARY_CHARSET;
    match column.column_type() {
        MyColumnType::MYSQL_TYPE_BIT => "bit",
        MyColumnType::MYSQL_TYPE_TINY => "tinyint",
        MyColumnType::MYSQL_TYPE_SHORT => "smallint",
        MyColumnType::MYSQL_TYPE_INT24 => "mediumint",
        MyColumnType::MYSQL_TYPE_LONG => "int",
        MyColumnType::MYSQL_TYPE_LONGLONG => "bigint",
        MyColumnType::MYSQL_TYPE_FLOAT => "float",
        MyColumnType::MYSQL_TYPE_DOUBLE => "double",
        MyColumnType::MYSQL_TYPE_DECIMAL | MyColumnType::MYSQL_TYPE_NEWDECIMAL => "decimal",
        MyColumnType::MYSQL_TYPE_YEAR => "year",
        MyColumnType::MYSQL_TYPE_DATE | MyColumnType::MYSQL_TYPE_NEWDATE => "date",
        MyColumnType::MYSQL_TYPE_TIME | MyColumnType::MYSQL_TYPE_TIME2 => "time",
        MyColumnType::MYSQL_TYPE_DATETIME | MyColumnType::MYSQL_TYPE_DATETIME2 => "datetime",
        MyColumnType::MYSQL_TYPE_TIMESTAMP | MyColumnType::MYSQL_TYPE_TIMESTAMP2 => "timestamp",
        MyColumnType::MYSQL_TYPE_JSON => "json",
        MyColumnType::MYSQL_TYPE_STRING if binary => "binary",
        MyColumnType::MYSQL_TYPE_STRING => "char",
        MyColumnType::MYSQL_TYPE_VARCHAR | MyColumnType::MYSQL_TYPE_VAR_STRING if binary => "varbinary",
        MyColumnType::MYSQL_TYPE_VARCHAR | MyColumnType::MYSQL_TYPE_VAR_STRING => "varchar",
        MyColumnType::MYSQL_TYPE_TINY_BLOB
        | MyColumnType::MYSQL_TYPE_BLOB
        | MyColumnType::MYSQL_TYPE_MEDIUM_BLOB
        | MyColumnType::MYSQL_TYPE_LONG_BLOB
            if binary =>
        {
            "blob"
        }
        MyColumnType::MYSQL_TYPE_TINY_BLOB
        | MyColumnType::MYSQL_TYPE_BLOB
        | MyColumnType::MYSQL_TYPE_MEDIUM_BLOB
        | MyColumnType::MYSQL_TYPE_LONG_BLOB => "text",
        MyColumnType::MYSQL_TYPE_ENUM => "enum",
        MyColumnType::MYSQL_TYPE_SET => "set",
        _ => "unknown",
    }
}

fn row_to_json(row: &Row, columns: &[Column], charset: Charset) -> Result<Vec<serde_json::Value>> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let value = row.as_ref(idx).ok_or_else(|| {
                CompatError::query_failed(format!("Failed to get value at index {idx}"))
            })?;
            Ok(mysql_value_to_json(value, column, charset))
        })
        .collect()
}

/// Convert MySQL value to JSON value
fn mysql_value_to_json(value: &Value, column: &Column, charset: Charset) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        Value::NULL => Json::Null,

        Value::Bytes(bytes) if column.character_set() == BINARY_CHARSET => {
            Json::String(Charset::Binary.decode_column(bytes))
        }

        Value::Bytes(bytes) => Json::String(charset.decode_column(bytes)),

        Value::Int(i) => Json::Number((*i).into()),

        Value::UInt(u) => Json::Number((*u).into()),

        Value::Float(f) => {
            serde_json::Number::from_f64(f64::from(*f)).map_or(Json::Null, Json::Number) // Handle NaN/Infinity as null
        }

        Value::Double(d) => serde_json::Number::from_f64(*d).map_or(Json::Null, Json::Number),

        Value::Date(year, month, day, hour, minute, second, micro) => {
            let date = format!("{year:04}-{month:02}-{day:02}");
            if column.column_type() == MyColumnType::MYSQL_TYPE_DATE {
                Json::String(date)
            } else if *micro == 0 {
                Json::String(format!("{date} {hour:02}:{minute:02}:{second:02}"))
            } else {
                Json::String(format!("{date} {hour:02}:{minute:02}:{second:02}.{micro:06}"))
            }
        }

        Value::Time(is_negative, days, hours, minutes, seconds, _micro) => {
            let sign = if *is_negative { "-" } else { "" };
            let total_hours = days * 24 + u32::from(*hours);
            Json::String(format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}"))
        }
    }
}
