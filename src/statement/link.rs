//! Database link: one session plus the state the scripting-side adapters
//! keep per connection.
//!
//! A link remaps placeholders for its engine, binds parameters, keeps the
//! shared table metadata cache coherent with the DDL it executes, and answers
//! field-info requests from cached metadata.

use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::classify::{classify, StatementKind};
use super::field::FieldInfo;
use super::session::{EngineSession, ExecOutcome, StatementHandle};
use crate::clock::Clock;
use crate::engine::{self, ConnectionConfig, DatabaseType};
use crate::error::{CompatError, Result};
use crate::metadata::{TableDescriptor, TableKey, TableMetadataCache};
use crate::remap::{ParameterRemapper, PreparedQuery};

/// A statement prepared on a link
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    query: PreparedQuery,
    handle: StatementHandle,
}

impl PreparedStatement {
    /// Canonical SQL handed to the session
    #[must_use]
    pub fn sql(&self) -> &str {
        self.query.sql()
    }

    #[must_use]
    pub const fn query(&self) -> &PreparedQuery {
        &self.query
    }

    #[must_use]
    pub const fn handle(&self) -> &StatementHandle {
        &self.handle
    }
}

pub struct Link {
    session: Box<dyn EngineSession>,
    engine: DatabaseType,
    remapper: ParameterRemapper,
    cache: TableMetadataCache,
    clock: Arc<dyn Clock>,
    catalog: Option<String>,
    reusable: Arc<AtomicBool>,
    affected_rows: Option<u64>,
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("engine", &self.engine)
            .field("url", &self.session.url())
            .field("catalog", &self.catalog)
            .field("reusable", &self.is_reusable())
            .finish_non_exhaustive()
    }
}

impl Link {
    pub fn new(
        session: Box<dyn EngineSession>,
        cache: TableMetadataCache,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let engine = session.engine();
        Self {
            session,
            engine,
            remapper: ParameterRemapper::new(engine.placeholder_style()),
            cache,
            clock,
            catalog: None,
            reusable: Arc::new(AtomicBool::new(true)),
            affected_rows: None,
        }
    }

    /// Open a session for `config` and wrap it; the configured database
    /// becomes the selected catalog
    pub fn connect(
        config: &ConnectionConfig,
        cache: TableMetadataCache,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let session = engine::connect(config)?;
        Ok(Self::new(session, cache, clock).with_catalog(config.database.clone()))
    }

    /// Set the initially selected catalog (MySQL: database)
    #[must_use]
    pub fn with_catalog(mut self, catalog: Option<String>) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub const fn engine(&self) -> DatabaseType {
        self.engine
    }

    #[must_use]
    pub fn url(&self) -> &str {
        self.session.url()
    }

    #[must_use]
    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    /// Record a catalog switch (`mysqli_select_db`)
    pub fn select_catalog(&mut self, catalog: impl Into<String>) {
        self.catalog = Some(catalog.into());
    }

    /// False once the link may hold connection-scoped state (temporary tables)
    #[must_use]
    pub fn is_reusable(&self) -> bool {
        self.reusable.load(Ordering::Acquire)
    }

    /// Reusability readable without holding the link
    pub(crate) fn reusable_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.reusable)
    }

    /// Rows affected by the last successful execute
    #[must_use]
    pub const fn affected_rows(&self) -> Option<u64> {
        self.affected_rows
    }

    /// Remap `sql` for this engine and prepare it on the session
    pub fn prepare(&mut self, sql: &str) -> Result<PreparedStatement> {
        let query = self.remapper.prepare(sql)?;
        let handle = self.session.prepare(query.sql())?;
        Ok(PreparedStatement { query, handle })
    }

    /// Bind `params` in placeholder order and execute.
    ///
    /// Binding happens first, so an unbound placeholder fails before the
    /// session sees the statement.
    pub fn execute(&mut self, statement: &PreparedStatement, params: &[Value]) -> Result<ExecOutcome> {
        let bound = statement.query.bind(params)?;

        self.track(classify(statement.sql()));

        let outcome = self.session.execute(&statement.handle, &bound)?;
        self.affected_rows = outcome.rows_affected;
        Ok(outcome)
    }

    /// Prepare and execute in one step
    pub fn query(&mut self, sql: &str, params: &[Value]) -> Result<ExecOutcome> {
        let statement = self.prepare(sql)?;
        self.execute(&statement, params)
    }

    fn track(&mut self, kind: StatementKind) {
        if kind.changes_schema() {
            self.cache.invalidate_all();
        }

        match kind {
            StatementKind::Drop { database: Some(database) }
                if self.catalog.as_deref() == Some(database.as_str()) =>
            {
                info!(catalog = %database, "selected catalog dropped");
                self.catalog = None;
            }
            StatementKind::Create => {
                debug!(url = %self.session.url(), "link no longer reusable");
                self.reusable.store(false, Ordering::Release);
            }
            _ => {}
        }
    }

    /// Cached metadata for one table of the attached database
    pub fn table_metadata(
        &mut self,
        catalog: Option<&str>,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Arc<TableDescriptor>> {
        let key = TableKey::new(self.session.url(), catalog, schema, table);
        let now = self.clock.now_millis();
        self.cache.get_or_load(&key, self.session.as_catalog(), now)
    }

    /// Describe result column `index` of `result`
    pub fn field_info(&mut self, result: &ExecOutcome, index: usize) -> Result<FieldInfo> {
        let column = result.columns.get(index).ok_or_else(|| {
            CompatError::invalid_input(format!(
                "Field index {index} out of range ({} columns)",
                result.columns.len()
            ))
        })?;

        let table = match column.table.as_deref() {
            Some(table) => match self.table_metadata(None, column.schema.as_deref(), table) {
                Ok(table) => Some(table),
                Err(e) => {
                    debug!(table, "no metadata for result column: {e}");
                    None
                }
            },
            None => None,
        };

        Ok(FieldInfo::new(column, table.as_ref().and_then(|t| t.column(column.origin_name()))))
    }

    /// Describe every result column of `result`
    pub fn fields(&mut self, result: &ExecOutcome) -> Result<Vec<FieldInfo>> {
        (0..result.columns.len()).map(|i| self.field_info(result, i)).collect()
    }
}
