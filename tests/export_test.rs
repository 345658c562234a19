use std::fs;

use json_to_sqlite::export::{write_table, write_table_to_file, OutputFormat};
use json_to_sqlite::{Converter, RelationalStore, SqliteStore};
use serde_json::Value;
use tempfile::tempdir;

fn converted_store() -> SqliteStore {
    let mut store = SqliteStore::in_memory().expect("Failed to open store");
    Converter::default()
        .convert_str(
            r#"{"people": [{"name": "Ada", "age": 36}, {"name": "Linus", "age": null}]}"#,
            &mut store,
        )
        .expect("Conversion failed");
    store
}

#[test]
fn test_export_table_as_csv() {
    let store = converted_store();
    let rows = store.table_rows("root_people", 10).unwrap();

    let temp_dir = tempdir().expect("Failed to create temp directory");
    let path = temp_dir.path().join("exports").join("people.csv");
    let written = write_table_to_file(&rows, OutputFormat::Csv, &path).expect("Failed to export");
    assert_eq!(written, path);

    let content = fs::read_to_string(&path).unwrap();
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("name,age,created_at"));
    assert!(lines.next().unwrap().starts_with("Ada,36,"));
    assert!(lines.next().unwrap().starts_with("Linus,,"));
    assert_eq!(lines.next(), None);
}

#[test]
fn test_export_table_as_json() {
    let store = converted_store();
    let rows = store.table_rows("root_people", 10).unwrap();

    let mut out = Vec::new();
    write_table(&rows, OutputFormat::Json, &mut out).expect("Failed to export");
    let parsed: Value = serde_json::from_slice(&out).unwrap();

    let objects = parsed.as_array().unwrap();
    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0]["name"], "Ada");
    assert_eq!(objects[0]["age"], 36);
    assert!(objects[1]["age"].is_null());
    assert!(objects[1]["created_at"].is_string());
}

#[test]
fn test_export_table_as_txt() {
    let store = converted_store();
    let rows = store.table_rows("root_people", 1).unwrap();

    let mut out = Vec::new();
    write_table(&rows, OutputFormat::Txt, &mut out).expect("Failed to export");
    let text = String::from_utf8(out).unwrap();

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("name  age  created_at"));
    assert!(lines[1].starts_with("----  ---  ----------"));
    assert!(lines[2].starts_with("Ada   36   "));
}

#[test]
fn test_export_empty_table_writes_header_only() {
    let mut store = SqliteStore::in_memory().unwrap();
    Converter::default()
        .convert_str(r#"{"items": [{"n": 1}]}"#, &mut store)
        .unwrap();
    let rows = store.table_rows("root_items", 0).unwrap();
    assert!(rows.is_empty());

    let mut out = Vec::new();
    write_table(&rows, OutputFormat::Csv, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "n,created_at\n");
}

#[test]
fn test_output_format_extension() {
    assert_eq!(OutputFormat::Txt.extension(), "txt");
    assert_eq!(OutputFormat::Csv.extension(), "csv");
    assert_eq!(OutputFormat::Json.extension(), "json");
    assert_eq!(OutputFormat::default(), OutputFormat::Txt);
    assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
}
