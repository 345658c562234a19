//! Relational store adapter.
//!
//! [`RelationalStore`] is the boundary between the two conversion passes and
//! the embedded SQL engine. [`SqliteStore`] implements it on top of a single
//! rusqlite connection that is owned by exactly one conversion job.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{ConversionError, Result};
use crate::identifier::{quote_identifier, sanitize_identifier};
use crate::models::{Cell, ColumnInfo, Row, TableDefinition, TableRows, CREATED_AT};

/// Rows returned by [`RelationalStore::table_rows`] when the caller has no
/// preference
pub const DEFAULT_ROW_LIMIT: usize = 100;

/// Operations the conversion passes and their callers need from a store.
///
/// The write side returns raw `rusqlite` errors so each pass can decide
/// whether a failure is fatal (schema) or recorded per row (data).
#[cfg_attr(test, mockall::automock)]
pub trait RelationalStore {
    /// Create the table unless one with the same name exists.
    ///
    /// Returns `true` when a new table was created.
    fn create_table(&mut self, table: &TableDefinition) -> rusqlite::Result<bool>;

    /// Column names of a table, or `None` if it does not exist
    fn table_columns(&self, table: &str) -> rusqlite::Result<Option<Vec<String>>>;

    /// Insert one row
    fn insert_row(&mut self, table: &str, row: &Row) -> rusqlite::Result<()>;

    /// Names of all user tables, in creation order
    fn list_tables(&self) -> Result<Vec<String>>;

    /// Column metadata of a table
    fn table_schema(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Up to `limit` rows of a table, in store order
    fn table_rows(&self, table: &str, limit: usize) -> Result<TableRows>;
}

enum Location {
    Memory,
    File(PathBuf),
    Temporary(NamedTempFile),
}

/// SQLite-backed store for one conversion job
pub struct SqliteStore {
    // Declared before `location` so the connection closes before a
    // temporary file is removed.
    conn: Connection,
    location: Location,
}

impl SqliteStore {
    /// Open a private in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            location: Location::Memory,
        })
    }

    /// Create a fresh database in a temporary file.
    ///
    /// The file is deleted when the store is dropped unless it is handed
    /// over with [`SqliteStore::persist`].
    pub fn temporary() -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("json_to_sqlite_")
            .suffix(".db")
            .tempfile()?;
        let conn = Connection::open(file.path())?;
        debug!(path = %file.path().display(), "Opened temporary database");
        Ok(Self {
            conn,
            location: Location::Temporary(file),
        })
    }

    /// Create a fresh database file at `path`.
    ///
    /// An existing file is replaced only when `overwrite` is set.
    pub fn create(path: &Path, overwrite: bool) -> Result<Self> {
        if path.exists() {
            if !overwrite {
                return Err(ConversionError::OutputExists(path.to_path_buf()));
            }
            fs::remove_file(path)?;
        }

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            location: Location::File(path.to_path_buf()),
        })
    }

    /// Open an existing database file for browsing
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ConversionError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("database file not found: {}", path.display()),
            )));
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            location: Location::File(path.to_path_buf()),
        })
    }

    /// Backing file, if the database lives on disk
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::Memory => None,
            Location::File(path) => Some(path),
            Location::Temporary(file) => Some(file.path()),
        }
    }

    /// Close the store and write the finished database to `dest`.
    ///
    /// A temporary database is moved into place; other databases are
    /// copied. The store is consumed either way.
    pub fn persist(self, dest: &Path, overwrite: bool) -> Result<PathBuf> {
        if dest.exists() && !overwrite && self.path() != Some(dest) {
            return Err(ConversionError::OutputExists(dest.to_path_buf()));
        }
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let Self { conn, location } = self;
        match location {
            Location::Memory => {
                let target = dest.to_str().ok_or_else(|| {
                    ConversionError::Validation(format!("Output path is not valid UTF-8: {}", dest.display()))
                })?;
                if dest.exists() {
                    fs::remove_file(dest)?;
                }
                conn.execute("VACUUM INTO ?1", params![target])?;
                conn.close().map_err(|(_, e)| e)?;
            }
            Location::File(path) => {
                conn.close().map_err(|(_, e)| e)?;
                if path != dest {
                    fs::copy(&path, dest)?;
                }
            }
            Location::Temporary(file) => {
                conn.close().map_err(|(_, e)| e)?;
                if let Err(err) = file.persist(dest) {
                    // Rename fails across filesystems; fall back to a copy and
                    // let the temporary file drop.
                    fs::copy(err.file.path(), dest)?;
                }
            }
        }

        info!(path = %dest.display(), "Database written");
        Ok(dest.to_path_buf())
    }

    // SQLite resolves table names case-insensitively, so `root_a` and
    // `root_A` name the same table.
    fn table_exists(&self, table: &str) -> rusqlite::Result<bool> {
        self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master \
             WHERE type = 'table' AND name = ?1 COLLATE NOCASE)",
            params![table],
            |row| row.get(0),
        )
    }

    fn require_table(&self, table: &str) -> Result<String> {
        let name = sanitize_identifier(table);
        if self.table_exists(&name)? {
            Ok(name)
        } else {
            Err(ConversionError::UnknownTable(table.to_string()))
        }
    }
}

impl RelationalStore for SqliteStore {
    fn create_table(&mut self, table: &TableDefinition) -> rusqlite::Result<bool> {
        let name = table.path.as_str();
        if self.table_exists(name)? {
            debug!(table = name, "Table already exists");
            return Ok(false);
        }

        let mut columns: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("{} {}", quote_identifier(&c.name), c.column_type))
            .collect();
        columns.push(format!(
            "{} TIMESTAMP DEFAULT CURRENT_TIMESTAMP",
            quote_identifier(CREATED_AT)
        ));

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_identifier(name),
            columns.join(", ")
        );
        debug!(table = name, ddl = %ddl, "Creating table");
        self.conn.execute_batch(&ddl)?;
        Ok(true)
    }

    fn table_columns(&self, table: &str) -> rusqlite::Result<Option<Vec<String>>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT name FROM pragma_table_info(?1)")?;
        let columns = stmt
            .query_map(params![table], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(if columns.is_empty() { None } else { Some(columns) })
    }

    fn insert_row(&mut self, table: &str, row: &Row) -> rusqlite::Result<()> {
        let columns: Vec<String> = row.columns().map(quote_identifier).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let query = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table),
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut stmt = self.conn.prepare_cached(&query)?;
        stmt.execute(params_from_iter(row.values().map(sql_value)))?;
        Ok(())
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
        )?;
        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tables)
    }

    fn table_schema(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let name = self.require_table(table)?;
        let mut stmt = self.conn.prepare(
            "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1)",
        )?;
        let columns = stmt
            .query_map(params![name], |row| {
                Ok(ColumnInfo {
                    position: row.get(0)?,
                    name: row.get(1)?,
                    declared_type: row.get(2)?,
                    not_null: row.get::<_, i64>(3)? != 0,
                    default_value: row.get(4)?,
                    primary_key: row.get::<_, i64>(5)? != 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    fn table_rows(&self, table: &str, limit: usize) -> Result<TableRows> {
        let name = self.require_table(table)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {} LIMIT ?1", quote_identifier(&name)))?;
        let columns: Vec<String> = stmt.column_names().iter().map(ToString::to_string).collect();
        let width = columns.len();

        let rows = stmt
            .query_map(params![limit], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(cell_from_ref))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(TableRows { columns, rows })
    }
}

/// Bind a scalar JSON value as an SQLite value.
///
/// Booleans become 0/1. Integers that do not fit in `i64` are stored as
/// text so no digits are lost.
fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if n.is_u64() {
                SqlValue::Text(n.to_string())
            } else {
                n.as_f64().map_or(SqlValue::Null, SqlValue::Real)
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

fn cell_from_ref(value: ValueRef<'_>) -> Cell {
    match value {
        ValueRef::Null => Cell::Null,
        ValueRef::Integer(i) => Cell::Integer(i),
        ValueRef::Real(r) => Cell::Real(r),
        ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Cell::Blob(b.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnDefinition, ColumnType, TablePath};
    use serde_json::json;

    fn people() -> TableDefinition {
        TableDefinition {
            path: TablePath::root().child("people"),
            columns: vec![
                ColumnDefinition::new("name", ColumnType::Text),
                ColumnDefinition::new("age", ColumnType::Integer),
                ColumnDefinition::new("active", ColumnType::Boolean),
            ],
        }
    }

    #[test]
    fn test_create_table_is_idempotent() {
        let mut store = SqliteStore::in_memory().unwrap();
        assert!(store.create_table(&people()).unwrap());
        assert!(!store.create_table(&people()).unwrap());
        assert_eq!(store.list_tables().unwrap(), vec!["root_people"]);
    }

    #[test]
    fn test_table_names_match_case_insensitively() {
        let mut store = SqliteStore::in_memory().unwrap();
        let upper = TableDefinition {
            path: TablePath::root().child("A"),
            columns: vec![ColumnDefinition::new("x", ColumnType::Integer)],
        };
        let lower = TableDefinition {
            path: TablePath::root().child("a"),
            columns: vec![ColumnDefinition::new("y", ColumnType::Integer)],
        };
        assert!(store.create_table(&upper).unwrap());
        assert!(!store.create_table(&lower).unwrap());
        assert_eq!(store.list_tables().unwrap(), vec!["root_A"]);
        assert_eq!(store.table_schema("ROOT_A").unwrap().len(), 2);
    }

    #[test]
    fn test_created_at_is_appended() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.create_table(&people()).unwrap();
        let columns = store.table_columns("root_people").unwrap().unwrap();
        assert_eq!(columns, vec!["name", "age", "active", "created_at"]);
        assert_eq!(store.table_columns("missing").unwrap(), None);
    }

    #[test]
    fn test_insert_and_read_back() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.create_table(&people()).unwrap();
        let value = json!({"name": "Ada", "age": 36, "active": true});
        let row = Row::from_object(value.as_object().unwrap());
        store.insert_row("root_people", &row).unwrap();

        let rows = store.table_rows("root_people", DEFAULT_ROW_LIMIT).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.cell(0, "name"), Some(&Cell::Text("Ada".to_string())));
        assert_eq!(rows.cell(0, "age"), Some(&Cell::Integer(36)));
        assert_eq!(rows.cell(0, "active"), Some(&Cell::Integer(1)));
        assert!(matches!(rows.cell(0, "created_at"), Some(Cell::Text(_))));
    }

    #[test]
    fn test_sql_value_conversion() {
        assert_eq!(sql_value(&json!(null)), SqlValue::Null);
        assert_eq!(sql_value(&json!(false)), SqlValue::Integer(0));
        assert_eq!(sql_value(&json!(7)), SqlValue::Integer(7));
        assert_eq!(sql_value(&json!(1.5)), SqlValue::Real(1.5));
        assert_eq!(
            sql_value(&json!(u64::MAX)),
            SqlValue::Text(u64::MAX.to_string())
        );
    }

    #[test]
    fn test_unknown_table() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(matches!(
            store.table_schema("nope"),
            Err(ConversionError::UnknownTable(_))
        ));
        assert!(matches!(
            store.table_rows("nope", 10),
            Err(ConversionError::UnknownTable(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_persist_rejects_non_utf8_destination() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join(OsStr::from_bytes(b"out\xff.db"));
        let store = SqliteStore::in_memory().unwrap();

        let err = store.persist(&dest, false).unwrap_err();
        assert!(matches!(err, ConversionError::Validation(_)));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_temporary_file_removed_on_drop() {
        let store = SqliteStore::temporary().unwrap();
        let path = store.path().unwrap().to_path_buf();
        assert!(path.exists());
        drop(store);
        assert!(!path.exists());
    }
}
