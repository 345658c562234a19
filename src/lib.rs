//! JSON to SQLite - Schema Inference and Flattening
//!
//! A Rust library that turns an arbitrary, deeply nested JSON document into
//! a set of SQLite tables: one table per object shape at each nesting path,
//! linked to its parent only by name (`root`, `root_items`,
//! `root_items_meta`, ...).
//!
//! # Features
//!
//! - Two-pass conversion: the schema pass creates every table, the data
//!   pass inserts one row per object
//! - Column types inferred from JSON scalars (BOOLEAN, INTEGER, REAL, TEXT)
//! - JSON keys sanitized into safe SQL identifiers
//! - Per-row failure reporting without aborting the job
//! - Browsing and export of the generated tables (TXT, CSV, JSON)
//!
//! # Known limitations
//!
//! - Columns come from the first object seen at a path; fields that only
//!   appear in later objects are dropped
//! - Distinct keys can sanitize to the same identifier; the last one wins
//! - There are no foreign keys and repeated sub-objects are not deduplicated

/// Configuration management
pub mod config;
/// Conversion jobs
pub mod converter;
/// Relational store adapter
pub mod db;
/// Error types
pub mod error;
/// Table export
pub mod export;
/// SQL identifier sanitizing and quoting
pub mod identifier;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and type inference
pub mod models;
/// Data pass
pub mod populate;
/// Schema pass
pub mod schema;
/// Input validation
pub mod validation;

// Re-export key components for easier access
pub use converter::{Conversion, ConversionOptions, Converter};
pub use db::{RelationalStore, SqliteStore, DEFAULT_ROW_LIMIT};
pub use error::{ConversionError, Result};
pub use identifier::sanitize_identifier;
pub use models::{infer_type, ColumnType, ConversionReport, TablePath};
pub use populate::populate_data;
pub use schema::derive_schema;
