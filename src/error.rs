//! Error types for the json-to-sqlite library.
//!
//! Fatal failures (malformed input, DDL failures, runaway nesting) are
//! returned as [`ConversionError`]. Failed row inserts are not errors: they
//! are collected in the conversion report and the job keeps going.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a conversion job or a store query.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// The input was not well-formed JSON
    #[error("Invalid JSON input: {0}")]
    Parse(#[from] serde_json::Error),

    /// A table could not be created during the schema pass
    #[error("Failed to create table {table}: {source}")]
    Schema {
        /// Table path whose DDL failed
        table: String,
        /// Underlying store error
        #[source]
        source: rusqlite::Error,
    },

    /// The document nests deeper than the configured limit
    #[error("Nesting depth {depth} at {table} exceeds the limit of {limit}")]
    DepthExceeded {
        /// Table path that would have been derived
        table: String,
        /// Depth reached
        depth: usize,
        /// Configured limit
        limit: usize,
    },

    /// Store-level errors outside of the schema pass
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Refusing to replace an existing database file
    #[error("Output file already exists: {}", .0.display())]
    OutputExists(PathBuf),

    /// A query named a table that does not exist
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Caller input rejected before it reached the engine
    #[error("Validation failed: {0}")]
    Validation(String),

    /// CSV export errors
    #[error("Export error: {0}")]
    Export(#[from] csv::Error),

    /// JSON export errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),
}

impl ConversionError {
    /// Whether this error means no database was produced.
    ///
    /// Every variant is fatal except the query-side ones, which only
    /// affect a single read against an already finished database.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::UnknownTable(_) | Self::Export(_) | Self::Serialization(_))
    }
}

/// Convenience type alias for Result with `ConversionError`
pub type Result<T> = std::result::Result<T, ConversionError>;

impl From<config::ConfigError> for ConversionError {
    fn from(err: config::ConfigError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
