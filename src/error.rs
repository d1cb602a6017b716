//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout dbcompat.
//! Every error maps to a stable code so the scripting runtime (or the CLI's
//! JSON envelope) can translate it into its own warning/error state.
//!
//! # Error Categories
//! - `CatalogAccess`: the mandatory column listing for a table failed
//! - `MalformedPlaceholder`: a `$n` placeholder index does not fit an integer
//! - `UnboundParameter`: a placeholder references a parameter never supplied
//! - `EncodingCorruption`: text handed to the latin1 encoder was already lossy
//! - `ConnectionFailed` / `QueryFailed` / `EngineError`: SQL session failures
//! - `InvalidInput` / `ConfigError`: caller or configuration mistakes
//!
//! Primary-key and index listing failures are deliberately absent: they are
//! logged and degrade column flags, they never surface as errors.

use thiserror::Error;

/// Main error type for dbcompat operations
#[derive(Error, Debug)]
pub enum CompatError {
    /// The primary "describe columns" catalog call failed
    #[error("Catalog access failed for table '{table}': {detail}")]
    CatalogAccess { table: String, detail: String },

    /// A placeholder's embedded index could not be parsed
    #[error("Malformed placeholder '{token}' at offset {offset}")]
    MalformedPlaceholder { token: String, offset: usize },

    /// A placeholder referenced a parameter slot the caller never supplied
    #[error("Unbound parameter ${placeholder}: {supplied} parameter(s) supplied")]
    UnboundParameter { placeholder: u32, supplied: usize },

    /// Text contains U+FFFD, evidence of an earlier lossy decode
    #[error("Encoding corruption: replacement character at offset {offset}")]
    EncodingCorruption { offset: usize },

    /// Database connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query preparation or execution failed
    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    /// Invalid input or missing required parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Engine-specific database error
    #[error("Engine error ({engine}): {detail}")]
    EngineError { engine: String, detail: String },

    /// Configuration error (file not found, invalid JSON, etc.)
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl CompatError {
    /// Convert error to a stable error code string
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::CatalogAccess { .. } => "CATALOG_ACCESS_FAILED",
            Self::MalformedPlaceholder { .. } => "MALFORMED_PLACEHOLDER",
            Self::UnboundParameter { .. } => "UNBOUND_PARAMETER",
            Self::EncodingCorruption { .. } => "ENCODING_CORRUPTION",
            Self::ConnectionFailed(_) => "CONNECTION_FAILED",
            Self::QueryFailed(_) => "QUERY_FAILED",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::EngineError { .. } => "ENGINE_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    /// Human-readable message, safe for JSON output (never contains credentials)
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Create a catalog access error
    pub fn catalog_access(table: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::CatalogAccess { table: table.into(), detail: detail.into() }
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    /// Create a query failed error
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed(message.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an engine-specific error
    pub fn engine_error(engine: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::EngineError { engine: engine.into(), detail: detail.into() }
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }
}

/// Result type alias for dbcompat operations
pub type Result<T> = std::result::Result<T, CompatError>;
