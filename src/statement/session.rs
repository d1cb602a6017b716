//! SQL session capability consumed by links.

use serde::Serialize;
use serde_json::Value;

use crate::engine::DatabaseType;
use crate::error::Result;
use crate::metadata::CatalogSource;

/// A statement the session accepted, in canonical `?` form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementHandle {
    sql: String,
    param_count: Option<usize>,
}

impl StatementHandle {
    pub fn new(sql: impl Into<String>, param_count: Option<usize>) -> Self {
        Self { sql: sql.into(), param_count }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of parameters the server expects, when the driver reports it
    #[must_use]
    pub const fn param_count(&self) -> Option<usize> {
        self.param_count
    }
}

/// Result column as reported by the driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultColumn {
    pub name: String,

    /// Source table, when the driver knows it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    /// Source schema (MySQL: database), when the driver knows it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Column name in the source table, when it differs from `name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    /// Driver-reported type name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

impl ResultColumn {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), table: None, schema: None, origin: None, type_name: None }
    }

    /// Record the source column name; kept only for aliased columns
    #[must_use]
    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin).filter(|o| !o.is_empty() && *o != self.name).map(str::to_string);
        self
    }

    /// Name to look up in the source table's metadata
    #[must_use]
    pub fn origin_name(&self) -> &str {
        self.origin.as_deref().unwrap_or(&self.name)
    }

    #[must_use]
    pub fn from_table(mut self, schema: Option<&str>, table: &str) -> Self {
        self.schema = schema.filter(|s| !s.is_empty()).map(str::to_string);
        self.table = Some(table).filter(|t| !t.is_empty()).map(str::to_string);
        self
    }

    #[must_use]
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }
}

/// Outcome of one execute call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecOutcome {
    pub columns: Vec<ResultColumn>,

    /// Result rows, one JSON value per column
    pub rows: Vec<Vec<Value>>,

    /// Rows affected (INSERT/UPDATE/DELETE/DDL)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
}

/// Synchronous SQL session
///
/// Statements arrive in canonical form, parameters already in placeholder
/// order.
pub trait SqlSession {
    fn engine(&self) -> DatabaseType;

    /// Credential-free identity of the attached database
    fn url(&self) -> &str;

    fn prepare(&mut self, sql: &str) -> Result<StatementHandle>;

    fn execute(&mut self, statement: &StatementHandle, params: &[Value]) -> Result<ExecOutcome>;
}

/// Everything a link needs from an engine connection
pub trait EngineSession: SqlSession + CatalogSource + Send {
    fn as_catalog(&mut self) -> &mut dyn CatalogSource;
}

impl<T: SqlSession + CatalogSource + Send> EngineSession for T {
    fn as_catalog(&mut self) -> &mut dyn CatalogSource {
        self
    }
}
