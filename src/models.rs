//! Data models for JSON-to-table conversion
//!
//! This module contains the types shared by the schema pass, the data pass
//! and the store: table paths, column and table definitions, rows, and the
//! report a conversion job hands back to its caller.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identifier::sanitize_identifier;

/// Table path of the top-level object
pub const ROOT_TABLE: &str = "root";

/// Timestamp column every generated table carries
pub const CREATED_AT: &str = "created_at";

/// Storage type of a generated column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    /// JSON `true` / `false`
    Boolean,
    /// JSON numbers without a fractional part
    Integer,
    /// Any other JSON number
    Real,
    /// Strings and `null`
    Text,
}

impl ColumnType {
    /// Infer the storage type of a scalar JSON value.
    ///
    /// Booleans are checked before numbers and integers before reals;
    /// strings and `null` fall through to [`ColumnType::Text`]. Objects and
    /// arrays never become columns, but they map to `Text` as well so the
    /// function stays total.
    #[must_use]
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(_) => Self::Real,
            Value::Null | Value::String(_) | Value::Array(_) | Value::Object(_) => Self::Text,
        }
    }

    /// Declared type used in generated DDL
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Shorthand for [`ColumnType::infer`]
#[must_use]
pub fn infer_type(value: &Value) -> ColumnType {
    ColumnType::infer(value)
}

/// Whether a JSON value is a scalar (neither object nor array)
#[must_use]
pub const fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

/// Key locating a generated table.
///
/// The root object maps to [`ROOT_TABLE`]; a structure nested under field
/// `f` of path `p` maps to `p_f`. Both passes derive paths through
/// [`TablePath::child`] only, which is what ties a child's rows to the table
/// the schema pass created for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TablePath(String);

impl TablePath {
    /// Path of the top-level object
    #[must_use]
    pub fn root() -> Self {
        Self(ROOT_TABLE.to_string())
    }

    /// Path with a caller-chosen root name, sanitized
    #[must_use]
    pub fn named(raw: &str) -> Self {
        Self(sanitize_identifier(raw))
    }

    /// Path of the structure nested under `field`
    #[must_use]
    pub fn child(&self, field: &str) -> Self {
        Self(format!("{}_{}", self.0, sanitize_identifier(field)))
    }

    /// Table name as used in SQL
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TablePath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for TablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A sanitized column name and its storage type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Sanitized column name
    pub name: String,
    /// Inferred storage type
    pub column_type: ColumnType,
}

impl ColumnDefinition {
    /// Create a column definition, sanitizing the raw name
    #[must_use]
    pub fn new(raw_name: &str, column_type: ColumnType) -> Self {
        Self {
            name: sanitize_identifier(raw_name),
            column_type,
        }
    }
}

/// A table to create: its path plus the columns taken from one object.
///
/// The implicit [`CREATED_AT`] column is not listed here; the store adds it
/// when it renders the DDL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Table path, used verbatim as the table name
    pub path: TablePath,
    /// Columns in JSON key order
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    /// Derive the columns of `path` from the scalar fields of `object`.
    ///
    /// Keys that sanitize to the same name keep the position of the first
    /// occurrence and the type of the last.
    #[must_use]
    pub fn from_object(path: TablePath, object: &Map<String, Value>) -> Self {
        let mut columns: Vec<ColumnDefinition> = Vec::new();
        for (key, value) in object.iter().filter(|(_, v)| is_scalar(v)) {
            let column = ColumnDefinition::new(key, infer_type(value));
            match columns.iter_mut().find(|c| c.name == column.name) {
                Some(existing) => existing.column_type = column.column_type,
                None => columns.push(column),
            }
        }
        Self { path, columns }
    }

    /// Whether the object had no scalar fields
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Scalar values of one JSON object, keyed by sanitized column name
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<(String, Value)>,
}

impl Row {
    /// Collect the scalar fields of `object`.
    ///
    /// Keys that sanitize to the same name keep the last value.
    #[must_use]
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let mut values: Vec<(String, Value)> = Vec::new();
        for (key, value) in object.iter().filter(|(_, v)| is_scalar(v)) {
            let name = sanitize_identifier(key);
            match values.iter_mut().find(|(n, _)| *n == name) {
                Some(slot) => slot.1 = value.clone(),
                None => values.push((name, value.clone())),
            }
        }
        Self { values }
    }

    /// Drop values whose column is not in `columns`, returning how many
    /// were dropped
    pub fn retain_columns(&mut self, columns: &[String]) -> usize {
        let before = self.values.len();
        self.values.retain(|(name, _)| columns.iter().any(|c| c == name));
        before - self.values.len()
    }

    /// Whether there is nothing to insert
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of values
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Column names in order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    /// Values in column order
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().map(|(_, value)| value)
    }

    /// Value of a column, if present
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }
}

/// Extend a JSON pointer (RFC 6901) by one reference token
#[must_use]
pub fn pointer_child(parent: &str, token: &str) -> String {
    format!("{parent}/{}", token.replace('~', "~0").replace('/', "~1"))
}

/// Column metadata as reported by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Zero-based column position
    pub position: i64,
    /// Column name
    pub name: String,
    /// Declared type
    pub declared_type: String,
    /// Whether the column is declared NOT NULL
    pub not_null: bool,
    /// Default value expression, if any
    pub default_value: Option<String>,
    /// Whether the column is part of the primary key
    pub primary_key: bool,
}

/// A single stored value read back from a table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    /// SQL NULL
    Null,
    /// 64-bit integer
    Integer(i64),
    /// 64-bit float
    Real(f64),
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Blob(Vec<u8>),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => f.write_str(s),
            Self::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Rows read back from one table
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TableRows {
    /// Column names in table order
    pub columns: Vec<String>,
    /// Row values, each in column order
    pub rows: Vec<Vec<Cell>>,
}

impl TableRows {
    /// Number of rows read
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows were read
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `column` in row `index`
    #[must_use]
    pub fn cell(&self, index: usize, column: &str) -> Option<&Cell> {
        let position = self.columns.iter().position(|c| c == column)?;
        self.rows.get(index)?.get(position)
    }
}

/// A row insert that failed during the data pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// Target table
    pub table: String,
    /// JSON pointer of the object that produced the row
    pub pointer: String,
    /// Store error message
    pub message: String,
}

/// Outcome of a conversion job that produced a database
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    /// Tables created by the schema pass, in creation order
    pub tables_created: Vec<String>,
    /// Rows written by the data pass
    pub rows_inserted: usize,
    /// Objects skipped because no scalar field had a column
    pub rows_skipped: usize,
    /// Scalar fields dropped because their table had no matching column
    pub fields_dropped: usize,
    /// Row inserts that failed
    pub failures: Vec<RowFailure>,
    /// When the job started
    pub started_at: DateTime<Utc>,
    /// When the job finished
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for ConversionReport {
    fn default() -> Self {
        Self {
            tables_created: Vec::new(),
            rows_inserted: 0,
            rows_skipped: 0,
            fields_dropped: 0,
            failures: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

impl ConversionReport {
    /// Whether every row was written
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failures recorded for one table
    pub fn failures_for<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a RowFailure> {
        self.failures.iter().filter(move |f| f.table == table)
    }

    /// Elapsed wall time, once finished
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}
