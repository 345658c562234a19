//! Unit tests for metrics.rs module

use std::time::Duration;

use json_to_sqlite::metrics::MetricsCollector;
use json_to_sqlite::models::RowFailure;
use json_to_sqlite::populate::PopulateOutcome;
use json_to_sqlite::{Converter, SqliteStore};

#[test]
fn test_metrics_collector_default() {
    let collector = MetricsCollector::default();
    assert_eq!(collector.jobs_total, 0);
    assert_eq!(collector.jobs_failed, 0);
    assert_eq!(collector.tables_created, 0);
    assert_eq!(collector.rows_inserted, 0);
    assert_eq!(collector.rows_skipped, 0);
    assert_eq!(collector.row_failures, 0);
}

#[test]
fn test_record_job_lifecycle() {
    let mut collector = MetricsCollector::default();
    collector.record_job_started();
    collector.record_job_started();
    collector.record_job_failed("schema");
    assert_eq!(collector.jobs_total, 2);
    assert_eq!(collector.jobs_failed, 1);
}

#[test]
fn test_record_data_pass() {
    let mut collector = MetricsCollector::default();
    let outcome = PopulateOutcome {
        rows_inserted: 4,
        rows_skipped: 1,
        fields_dropped: 2,
        failures: vec![RowFailure {
            table: "root_items".to_string(),
            pointer: "/items/3".to_string(),
            message: "constraint failed".to_string(),
        }],
    };
    collector.record_data_pass(&outcome, Duration::from_millis(3));
    collector.record_data_pass(&outcome, Duration::from_millis(3));

    assert_eq!(collector.rows_inserted, 8);
    assert_eq!(collector.rows_skipped, 2);
    assert_eq!(collector.row_failures, 2);
}

#[test]
fn test_converter_records_metrics() {
    let mut converter = Converter::default();
    let mut store = SqliteStore::in_memory().unwrap();
    converter
        .convert_str(r#"{"a": 1, "b": {"c": 2}, "d": {}}"#, &mut store)
        .unwrap();

    let mut other = SqliteStore::in_memory().unwrap();
    assert!(converter.convert_str("not json", &mut other).is_err());

    let metrics = converter.metrics();
    assert_eq!(metrics.jobs_total, 2);
    assert_eq!(metrics.jobs_failed, 1);
    assert_eq!(metrics.tables_created, 2);
    assert_eq!(metrics.rows_inserted, 2);
    assert_eq!(metrics.rows_skipped, 1);
    assert_eq!(metrics.row_failures, 0);
}
