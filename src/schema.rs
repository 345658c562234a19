//! Schema pass.
//!
//! Walks a JSON document once and creates one table per object shape found
//! at each [`TablePath`]. Columns come from the scalar fields of the first
//! object seen at a path; arrays contribute a table only when their first
//! element is an object, and only that element is inspected.
//!
//! Before any DDL is issued the whole document is checked against the depth
//! limit, every array element included, so a job that is too deep fails
//! without touching the store.

use serde_json::Value;
use tracing::{debug, info};

use crate::db::RelationalStore;
use crate::error::{ConversionError, Result};
use crate::models::{is_scalar, TableDefinition, TablePath};

/// Nesting levels the passes will follow by default.
///
/// Matches the recursion limit of `serde_json`'s parser, so any document it
/// accepts fits.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Derives and creates the tables for a JSON document
#[derive(Debug, Clone, Copy)]
pub struct SchemaDeriver {
    max_depth: usize,
}

impl Default for SchemaDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl SchemaDeriver {
    /// Create a deriver that refuses documents nested deeper than
    /// `max_depth` container levels
    #[must_use]
    pub const fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Create every table `value` needs, rooted at `path`.
    ///
    /// Returns the definitions of the tables that did not exist before.
    /// A document nested deeper than the limit or any DDL failure aborts
    /// the pass.
    pub fn derive<S>(&self, value: &Value, path: &TablePath, store: &mut S) -> Result<Vec<TableDefinition>>
    where
        S: RelationalStore + ?Sized,
    {
        self.check_nesting(value, path, 1)?;

        let mut created = Vec::new();
        Self::walk(value, path, store, &mut created)?;
        info!(tables = created.len(), "Schema derived");
        Ok(created)
    }

    fn walk<S>(
        value: &Value,
        path: &TablePath,
        store: &mut S,
        created: &mut Vec<TableDefinition>,
    ) -> Result<()>
    where
        S: RelationalStore + ?Sized,
    {
        match value {
            Value::Array(items) => {
                if let Some(first @ Value::Object(_)) = items.first() {
                    Self::walk(first, path, store, created)?;
                }
            }
            Value::Object(object) => {
                let table = TableDefinition::from_object(path.clone(), object);
                if table.is_empty() {
                    debug!(table = %path, "No scalar fields, table skipped");
                } else if store
                    .create_table(&table)
                    .map_err(|source| ConversionError::Schema {
                        table: path.to_string(),
                        source,
                    })?
                {
                    created.push(table);
                }

                for (key, child) in object {
                    if matches!(child, Value::Object(_) | Value::Array(_)) {
                        Self::walk(child, &path.child(key), store, created)?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Fail on the first container nested deeper than `max_depth`.
    ///
    /// Unlike the walk this visits every array element; recursion stops at
    /// the limit, so it is bounded even for hand-built values.
    fn check_nesting(&self, value: &Value, path: &TablePath, depth: usize) -> Result<()> {
        match value {
            Value::Array(items) => {
                for item in items.iter().filter(|item| !is_scalar(item)) {
                    self.check_depth(path, depth + 1)?;
                    self.check_nesting(item, path, depth + 1)?;
                }
            }
            Value::Object(object) => {
                for (key, child) in object.iter().filter(|(_, child)| !is_scalar(child)) {
                    let child_path = path.child(key);
                    self.check_depth(&child_path, depth + 1)?;
                    self.check_nesting(child, &child_path, depth + 1)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn check_depth(&self, path: &TablePath, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(ConversionError::DepthExceeded {
                table: path.to_string(),
                depth,
                limit: self.max_depth,
            });
        }
        Ok(())
    }
}

/// Run the schema pass with the default depth limit
pub fn derive_schema<S>(value: &Value, path: &TablePath, store: &mut S) -> Result<Vec<TableDefinition>>
where
    S: RelationalStore + ?Sized,
{
    SchemaDeriver::default().derive(value, path, store)
}
