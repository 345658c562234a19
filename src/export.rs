//! Table export.
//!
//! Writes rows read back from a generated table as CSV, JSON or an aligned
//! text grid. This is the downstream side of a conversion: browsing the
//! result or handing one table to another tool.

use std::fmt;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::{ConversionError, Result};
use crate::models::{Cell, TableRows};

/// Output format for exported rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Aligned plain-text grid
    #[default]
    Txt,
    /// Comma-separated values with a header row
    Csv,
    /// JSON array of objects keyed by column name
    Json,
}

impl OutputFormat {
    /// Get the file extension for this format
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "txt" | "text" => Ok(Self::Txt),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(ConversionError::Validation(format!(
                "Unknown output format: {other}. Must be one of: txt, csv, json"
            ))),
        }
    }
}

/// Write `rows` to `writer` in the given format
pub fn write_table<W: Write>(rows: &TableRows, format: OutputFormat, writer: W) -> Result<()> {
    match format {
        OutputFormat::Txt => write_txt(rows, writer),
        OutputFormat::Csv => write_csv(rows, writer),
        OutputFormat::Json => write_json(rows, writer),
    }
}

/// Write `rows` to a new file at `file_path`, creating parent directories
pub fn write_table_to_file(rows: &TableRows, format: OutputFormat, file_path: &Path) -> Result<PathBuf> {
    if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)?;
    }
    let file = File::create(file_path)?;
    write_table(rows, format, BufWriter::new(file))?;
    Ok(file_path.to_path_buf())
}

/// Render rows as an aligned text grid.
///
/// Format: header, a dashed rule, then one line per row with columns
/// separated by two spaces.
fn write_txt<W: Write>(rows: &TableRows, mut writer: W) -> Result<()> {
    let rendered: Vec<Vec<String>> = rows
        .rows
        .iter()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect();

    let widths: Vec<usize> = rows
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            rendered
                .iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    writeln!(writer, "{}", padded_line(rows.columns.iter().map(String::as_str), &widths))?;
    writeln!(
        writer,
        "{}",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  ")
    )?;
    for row in &rendered {
        writeln!(writer, "{}", padded_line(row.iter().map(String::as_str), &widths))?;
    }

    writer.flush()?;
    Ok(())
}

fn padded_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// Write rows as CSV.
///
/// Includes a header row with the column names; NULL becomes an empty field.
fn write_csv<W: Write>(rows: &TableRows, writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(&rows.columns)?;

    for row in &rows.rows {
        writer.write_record(row.iter().map(|cell| match cell {
            Cell::Null => String::new(),
            other => other.to_string(),
        }))?;
    }

    writer.flush()?;
    Ok(())
}

/// Write rows as a JSON array of objects.
fn write_json<W: Write>(rows: &TableRows, writer: W) -> Result<()> {
    let objects = rows
        .rows
        .iter()
        .map(|row| {
            rows.columns
                .iter()
                .zip(row)
                .map(|(name, cell)| -> Result<(String, Value)> {
                    let value = serde_json::to_value(cell).map_err(ConversionError::Serialization)?;
                    Ok((name.clone(), value))
                })
                .collect::<Result<Map<String, Value>>>()
                .map(Value::Object)
        })
        .collect::<Result<Vec<Value>>>()?;

    serde_json::to_writer_pretty(writer, &objects).map_err(ConversionError::Serialization)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TableRows {
        TableRows {
            columns: vec!["id".to_string(), "name".to_string()],
            rows: vec![
                vec![Cell::Integer(1), Cell::Text("Ada".to_string())],
                vec![Cell::Integer(20), Cell::Null],
            ],
        }
    }

    #[test]
    fn test_txt_grid_is_aligned() {
        let mut out = Vec::new();
        write_table(&sample(), OutputFormat::Txt, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "id  name\n--  ----\n1   Ada\n20  NULL\n");
    }

    #[test]
    fn test_csv_null_is_empty() {
        let mut out = Vec::new();
        write_table(&sample(), OutputFormat::Csv, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "id,name\n1,Ada\n20,\n");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_json_write_failure_is_a_serialization_error() {
        let err = write_table(&sample(), OutputFormat::Json, BrokenPipe).unwrap_err();
        assert!(matches!(err, ConversionError::Serialization(_)));
        assert!(err.to_string().starts_with("Serialization error"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Txt);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
