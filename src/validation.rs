use std::path::Path;

use crate::error::{ConversionError, Result};
use crate::identifier::sanitize_identifier;

/// Largest row limit a caller may ask for when browsing a table
pub const MAX_ROW_LIMIT: usize = 10_000;

/// Largest nesting depth a caller may configure
pub const MAX_DEPTH_LIMIT: usize = 4096;

fn invalid(message: impl Into<String>) -> ConversionError {
    ConversionError::Validation(message.into())
}

/// Validation utilities for caller input that reaches the engine or the store
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate the path of a JSON document to convert
    pub fn validate_input_path(path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(invalid("Input path cannot be empty"));
        }

        if !path.exists() {
            return Err(invalid(format!("Input file does not exist: {}", path.display())));
        }

        if !path.is_file() {
            return Err(invalid(format!("Input path is not a file: {}", path.display())));
        }

        Ok(())
    }

    /// Validate where a finished database will be written
    pub fn validate_output_path(path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(invalid("Output path cannot be empty"));
        }

        if path.is_dir() {
            return Err(invalid(format!("Output path is a directory: {}", path.display())));
        }

        // Check path length
        if path.to_string_lossy().len() > 4096 {
            return Err(invalid("Output path too long (max 4096 characters)"));
        }

        Ok(())
    }

    /// Validate a row limit for browsing
    pub fn validate_row_limit(limit: usize) -> Result<()> {
        if limit == 0 {
            return Err(invalid("Row limit must be greater than 0"));
        }

        if limit > MAX_ROW_LIMIT {
            return Err(invalid(format!("Row limit too large (max {MAX_ROW_LIMIT})")));
        }

        Ok(())
    }

    /// Validate the nesting limit of the conversion passes
    pub fn validate_max_depth(depth: usize) -> Result<()> {
        if depth == 0 {
            return Err(invalid("Max depth must be greater than 0"));
        }

        if depth > MAX_DEPTH_LIMIT {
            return Err(invalid(format!("Max depth too large (max {MAX_DEPTH_LIMIT})")));
        }

        Ok(())
    }

    /// Validate a table name supplied by a caller
    ///
    /// The name is usable as long as something survives sanitizing; a name
    /// made only of punctuation collapses to a lone underscore.
    pub fn validate_table_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(invalid("Table name cannot be empty"));
        }

        if name.len() > 255 {
            return Err(invalid("Table name too long (max 255 characters)"));
        }

        if sanitize_identifier(name).trim_matches('_').is_empty() {
            return Err(invalid(format!("Table name has no usable characters: {name:?}")));
        }

        Ok(())
    }
}
