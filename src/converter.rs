//! Conversion jobs.
//!
//! A job parses one JSON document, runs the schema pass to completion, then
//! the data pass, against a store owned by that job alone. Fatal failures
//! come back as `Err`; a database with some failed rows comes back as `Ok`
//! with the failures listed in the report.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::Utc;
use serde_json::Value;
use tracing::{error, info};

use crate::config::ConversionConfig;
use crate::db::{RelationalStore, SqliteStore};
use crate::error::{ConversionError, Result};
use crate::logging::OperationTimer;
use crate::metrics::MetricsCollector;
use crate::models::{ConversionReport, TablePath, ROOT_TABLE};
use crate::populate::DataPopulator;
use crate::schema::{SchemaDeriver, DEFAULT_MAX_DEPTH};

/// Settings of one conversion job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Table path of the top-level object
    pub root_table: String,
    /// Deepest nesting the passes will follow
    pub max_depth: usize,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            root_table: ROOT_TABLE.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl From<&ConversionConfig> for ConversionOptions {
    fn from(config: &ConversionConfig) -> Self {
        Self {
            root_table: config.root_table.clone(),
            max_depth: config.max_depth,
        }
    }
}

/// A finished job: the database it produced and what happened on the way
pub struct Conversion {
    /// Database holding every created table and inserted row
    pub store: SqliteStore,
    /// Tables, row counts and failed rows
    pub report: ConversionReport,
}

/// Runs conversion jobs
#[derive(Debug, Default)]
pub struct Converter {
    options: ConversionOptions,
    metrics: MetricsCollector,
}

impl Converter {
    /// Create a converter with the given options
    #[must_use]
    pub fn new(options: ConversionOptions) -> Self {
        Self {
            options,
            metrics: MetricsCollector::default(),
        }
    }

    /// Metrics recorded by the jobs run so far
    #[must_use]
    pub const fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Convert `input` into a fresh temporary database.
    ///
    /// On a fatal error the temporary file is removed before returning.
    pub fn run(&mut self, input: &str) -> Result<Conversion> {
        let mut store = SqliteStore::temporary()?;
        let report = self.convert_str(input, &mut store)?;
        Ok(Conversion { store, report })
    }

    /// Convert the JSON document at `path` into a fresh temporary database
    pub fn run_file(&mut self, path: &Path) -> Result<Conversion> {
        let mut store = SqliteStore::temporary()?;
        let report = self.convert_reader(File::open(path)?, &mut store)?;
        Ok(Conversion { store, report })
    }

    /// Parse `input` and convert it into `store`
    pub fn convert_str<S>(&mut self, input: &str, store: &mut S) -> Result<ConversionReport>
    where
        S: RelationalStore + ?Sized,
    {
        let value = self.parse(serde_json::from_str(input))?;
        self.convert_value(&value, store)
    }

    /// Parse a document from `reader` and convert it into `store`
    pub fn convert_reader<R, S>(&mut self, reader: R, store: &mut S) -> Result<ConversionReport>
    where
        R: Read,
        S: RelationalStore + ?Sized,
    {
        let value = self.parse(serde_json::from_reader(BufReader::new(reader)))?;
        self.convert_value(&value, store)
    }

    /// Convert an already parsed document into `store`
    pub fn convert_value<S>(&mut self, value: &Value, store: &mut S) -> Result<ConversionReport>
    where
        S: RelationalStore + ?Sized,
    {
        self.metrics.record_job_started();
        let mut report = ConversionReport::default();
        let root = TablePath::named(&self.options.root_table);
        info!(root = %root, "Starting conversion");

        // The data pass assumes every table exists, so it only runs once the
        // schema pass has succeeded in full.
        let timer = OperationTimer::new("schema_pass");
        let tables = match SchemaDeriver::new(self.options.max_depth).derive(value, &root, store) {
            Ok(tables) => tables,
            Err(err) => {
                error!(error = %err, "Schema pass failed, conversion aborted");
                self.metrics.record_job_failed(error_kind(&err));
                return Err(err);
            }
        };
        self.metrics.record_schema_pass(tables.len(), timer.finish());
        report.tables_created = tables.into_iter().map(|t| t.path.to_string()).collect();

        let timer = OperationTimer::new("data_pass");
        let outcome = DataPopulator::with_max_depth(self.options.max_depth).populate(value, &root, store);
        self.metrics.record_data_pass(&outcome, timer.finish());

        report.rows_inserted = outcome.rows_inserted;
        report.rows_skipped = outcome.rows_skipped;
        report.fields_dropped = outcome.fields_dropped;
        report.failures = outcome.failures;
        report.finished_at = Some(Utc::now());

        info!(
            tables = report.tables_created.len(),
            rows = report.rows_inserted,
            failed = report.failures.len(),
            "Conversion finished"
        );
        Ok(report)
    }

    fn parse(&mut self, parsed: serde_json::Result<Value>) -> Result<Value> {
        parsed.map_err(|err| {
            error!(error = %err, "Input is not valid JSON");
            self.metrics.record_job_started();
            self.metrics.record_job_failed("parse");
            ConversionError::Parse(err)
        })
    }
}

const fn error_kind(err: &ConversionError) -> &'static str {
    match err {
        ConversionError::Parse(_) => "parse",
        ConversionError::Schema { .. } => "schema",
        ConversionError::DepthExceeded { .. } => "depth",
        _ => "other",
    }
}
