//! Data pass.
//!
//! Walks the same JSON document a second time, deriving table paths exactly
//! as the schema pass does, and inserts one row per object. Every array
//! element is visited here, not just the first. A parent's row is written
//! before any of its children's rows.
//!
//! Failed inserts never stop the pass; they are returned as [`RowFailure`]s.
//! The same goes for structures nested deeper than the depth limit, which
//! are reported once and not descended into.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{info, trace, warn};

use crate::db::RelationalStore;
use crate::models::{is_scalar, pointer_child, Row, RowFailure, TablePath};
use crate::schema::DEFAULT_MAX_DEPTH;

/// Tallies of one data pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateOutcome {
    /// Rows written
    pub rows_inserted: usize,
    /// Objects with nothing to insert
    pub rows_skipped: usize,
    /// Scalar fields without a matching column
    pub fields_dropped: usize,
    /// Inserts that failed
    pub failures: Vec<RowFailure>,
}

/// Inserts the rows of a JSON document into tables created by the schema
/// pass.
///
/// Column lists are looked up once per table and reused for the rest of the
/// pass; tables are never altered after creation, so the cache cannot go
/// stale.
#[derive(Debug)]
pub struct DataPopulator {
    max_depth: usize,
    columns: HashMap<TablePath, Option<Vec<String>>>,
    outcome: PopulateOutcome,
}

impl Default for DataPopulator {
    fn default() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }
}

impl DataPopulator {
    /// Create a populator with an empty column cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a populator that stops descending below `max_depth`
    /// container levels
    #[must_use]
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            columns: HashMap::new(),
            outcome: PopulateOutcome::default(),
        }
    }

    /// Insert every object in `value`, rooted at `path`
    pub fn populate<S>(mut self, value: &Value, path: &TablePath, store: &mut S) -> PopulateOutcome
    where
        S: RelationalStore + ?Sized,
    {
        self.walk(value, path, "", 1, store);
        info!(
            rows = self.outcome.rows_inserted,
            skipped = self.outcome.rows_skipped,
            failed = self.outcome.failures.len(),
            "Data populated"
        );
        self.outcome
    }

    fn walk<S>(&mut self, value: &Value, path: &TablePath, pointer: &str, depth: usize, store: &mut S)
    where
        S: RelationalStore + ?Sized,
    {
        match value {
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate().filter(|(_, item)| !is_scalar(item)) {
                    self.descend(item, path, &pointer_child(pointer, &index.to_string()), depth + 1, store);
                }
            }
            Value::Object(object) => {
                self.insert(Row::from_object(object), path, pointer, store);

                for (key, child) in object.iter().filter(|(_, child)| !is_scalar(child)) {
                    self.descend(child, &path.child(key), &pointer_child(pointer, key), depth + 1, store);
                }
            }
            _ => {}
        }
    }

    fn descend<S>(&mut self, value: &Value, path: &TablePath, pointer: &str, depth: usize, store: &mut S)
    where
        S: RelationalStore + ?Sized,
    {
        if depth > self.max_depth {
            let message = format!("nesting depth {depth} exceeds the limit of {}", self.max_depth);
            self.outcome.fail(path, pointer, message);
            return;
        }
        self.walk(value, path, pointer, depth, store);
    }

    fn insert<S>(&mut self, mut row: Row, path: &TablePath, pointer: &str, store: &mut S)
    where
        S: RelationalStore + ?Sized,
    {
        if row.is_empty() {
            self.outcome.rows_skipped += 1;
            return;
        }

        let columns = match cached_columns(&mut self.columns, path, store) {
            Ok(Some(columns)) => columns,
            Ok(None) => {
                self.outcome.fail(path, pointer, format!("no such table: {path}"));
                return;
            }
            Err(err) => {
                self.outcome.fail(path, pointer, err.to_string());
                return;
            }
        };

        let dropped = row.retain_columns(columns);
        if dropped > 0 {
            trace!(table = %path, pointer, dropped, "Fields without a column dropped");
            self.outcome.fields_dropped += dropped;
        }
        if row.is_empty() {
            self.outcome.rows_skipped += 1;
            return;
        }

        match store.insert_row(path.as_str(), &row) {
            Ok(()) => {
                trace!(table = %path, pointer, "Row inserted");
                self.outcome.rows_inserted += 1;
            }
            Err(err) => self.outcome.fail(path, pointer, err.to_string()),
        }
    }
}

impl PopulateOutcome {
    fn fail(&mut self, path: &TablePath, pointer: &str, message: String) {
        warn!(table = %path, pointer, error = %message, "Row insert failed");
        self.failures.push(RowFailure {
            table: path.to_string(),
            pointer: pointer.to_string(),
            message,
        });
    }
}

fn cached_columns<'c, S>(
    cache: &'c mut HashMap<TablePath, Option<Vec<String>>>,
    path: &TablePath,
    store: &S,
) -> rusqlite::Result<Option<&'c [String]>>
where
    S: RelationalStore + ?Sized,
{
    if !cache.contains_key(path) {
        let columns = store.table_columns(path.as_str())?;
        cache.insert(path.clone(), columns);
    }
    Ok(cache.get(path).and_then(|c| c.as_deref()))
}

/// Run the data pass over `value`
pub fn populate_data<S>(value: &Value, path: &TablePath, store: &mut S) -> PopulateOutcome
where
    S: RelationalStore + ?Sized,
{
    DataPopulator::new().populate(value, path, store)
}
