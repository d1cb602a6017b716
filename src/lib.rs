//! dbcompat - database core for scripting-runtime compatibility adapters
//!
//! The mysqli/pg adapters of a scripting runtime sit on top of plain SQL
//! sessions. This library supplies the parts they share:
//!
//! - a Windows-1252 ("latin1") codec for MySQL text columns
//! - per-table column metadata, assembled from catalog queries and cached with
//!   a staleness window
//! - remapping of numbered `$n` placeholders to canonical `?` placeholders
//! - a [`Link`] that ties a session, the remapper and the metadata cache
//!   together, plus a [`LinkPool`] for persistent links
//!
//! # Module Organization
//! - [`error`] - Error types and handling
//! - [`charset`] - latin1 codec
//! - [`metadata`] - Column descriptors, catalog lookup, metadata cache
//! - [`remap`] - Placeholder remapping
//! - [`statement`] - Links, statement classification, field info
//! - [`engine`] - Connection config and engine sessions
//! - [`config`] - Configuration files
//! - [`output`] - JSON output envelopes for the CLI

pub mod charset;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod output;
pub mod remap;
pub mod statement;

pub use charset::Charset;
pub use engine::{ConnectionConfig, DatabaseType};
pub use error::{CompatError, Result};
pub use metadata::{
    CacheSettings, CatalogListing, CatalogSource, ColumnDescriptor, ColumnType, FieldFlags,
    TableDescriptor, TableKey, TableMetadataCache,
};
pub use output::{ErrorEnvelope, ErrorInfo, Metadata, SuccessEnvelope};
pub use remap::{ParameterRemapper, PlaceholderMap, PlaceholderStyle, PreparedQuery};
pub use statement::{
    ExecOutcome, FieldInfo, Link, LinkKey, LinkPool, PreparedStatement, ResultColumn, SharedLink,
    SqlSession, StatementKind,
};
