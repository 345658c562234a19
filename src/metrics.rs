use std::time::Duration;

use metrics::{counter, histogram};

use crate::populate::PopulateOutcome;

/// Jobs started
pub const JOBS_TOTAL: &str = "json_to_sqlite_jobs_total";
/// Jobs aborted by a fatal error, labelled by `kind`
pub const JOBS_FAILED_TOTAL: &str = "json_to_sqlite_jobs_failed_total";
/// Tables created by schema passes
pub const TABLES_CREATED_TOTAL: &str = "json_to_sqlite_tables_created_total";
/// Rows written by data passes
pub const ROWS_INSERTED_TOTAL: &str = "json_to_sqlite_rows_inserted_total";
/// Objects with nothing to insert
pub const ROWS_SKIPPED_TOTAL: &str = "json_to_sqlite_rows_skipped_total";
/// Failed row inserts, labelled by `table`
pub const ROW_FAILURES_TOTAL: &str = "json_to_sqlite_row_failures_total";
/// Schema pass wall time
pub const SCHEMA_PASS_DURATION: &str = "json_to_sqlite_schema_pass_duration_seconds";
/// Data pass wall time
pub const DATA_PASS_DURATION: &str = "json_to_sqlite_data_pass_duration_seconds";

/// Records conversion metrics through the `metrics` facade.
///
/// Without an installed recorder the facade calls are no-ops; the local
/// tallies are kept either way so callers can inspect them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsCollector {
    /// Jobs started
    pub jobs_total: u64,
    /// Jobs that ended in a fatal error
    pub jobs_failed: u64,
    /// Tables created
    pub tables_created: u64,
    /// Rows inserted
    pub rows_inserted: u64,
    /// Objects skipped
    pub rows_skipped: u64,
    /// Failed row inserts
    pub row_failures: u64,
}

impl MetricsCollector {
    /// Record the start of a job
    pub fn record_job_started(&mut self) {
        self.jobs_total += 1;
        counter!(JOBS_TOTAL).increment(1);
    }

    /// Record a job aborted by a fatal error of the given kind
    pub fn record_job_failed(&mut self, kind: &'static str) {
        self.jobs_failed += 1;
        counter!(JOBS_FAILED_TOTAL, "kind" => kind).increment(1);
    }

    /// Record a finished schema pass
    pub fn record_schema_pass(&mut self, tables_created: usize, duration: Duration) {
        self.tables_created += tables_created as u64;
        counter!(TABLES_CREATED_TOTAL).increment(tables_created as u64);
        histogram!(SCHEMA_PASS_DURATION).record(duration.as_secs_f64());
    }

    /// Record a finished data pass
    pub fn record_data_pass(&mut self, outcome: &PopulateOutcome, duration: Duration) {
        self.rows_inserted += outcome.rows_inserted as u64;
        self.rows_skipped += outcome.rows_skipped as u64;
        self.row_failures += outcome.failures.len() as u64;

        counter!(ROWS_INSERTED_TOTAL).increment(outcome.rows_inserted as u64);
        counter!(ROWS_SKIPPED_TOTAL).increment(outcome.rows_skipped as u64);
        for failure in &outcome.failures {
            counter!(ROW_FAILURES_TOTAL, "table" => failure.table.clone()).increment(1);
        }
        histogram!(DATA_PASS_DURATION).record(duration.as_secs_f64());
    }
}
