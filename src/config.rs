use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::db::DEFAULT_ROW_LIMIT;
use crate::error::{ConversionError, Result};
use crate::models::ROOT_TABLE;
use crate::schema::DEFAULT_MAX_DEPTH;
use crate::validation::InputValidator;

/// Prefix of environment variables that override configuration values,
/// e.g. `JSON_TO_SQLITE__CONVERSION__MAX_DEPTH=64`
pub const ENV_PREFIX: &str = "JSON_TO_SQLITE";

/// Application configuration structure
///
/// Nothing here is needed by the conversion engine itself; these are the
/// knobs of the command-line front end that drives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub conversion: ConversionConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Table path of the top-level object
    pub root_table: String,
    /// Deepest nesting the passes will follow
    pub max_depth: usize,
    /// Rows shown per table when browsing
    pub preview_row_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Where finished databases are written
    pub output_path: String,
    /// Replace an existing file at `output_path`
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub format: String, // "json" or "text"
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            conversion: ConversionConfig {
                root_table: ROOT_TABLE.to_string(),
                max_depth: DEFAULT_MAX_DEPTH,
                preview_row_limit: DEFAULT_ROW_LIMIT,
            },
            database: DatabaseConfig {
                output_path: "json_to_sqlite.db".to_string(),
                overwrite: false,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration, layering an explicit file over the defaults and
    /// the `config/` directory; environment variables win over all files
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            // Start with default values
            .add_source(Config::try_from(&Self::default())?)
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            // Add environment variables with prefix
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: Self = config.try_deserialize()?;

        // Validate configuration
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        InputValidator::validate_table_name(&self.conversion.root_table)?;
        InputValidator::validate_max_depth(self.conversion.max_depth)?;
        InputValidator::validate_row_limit(self.conversion.preview_row_limit)?;

        if self.database.output_path.trim().is_empty() {
            return Err(ConversionError::InvalidConfig("output_path cannot be empty".to_string()));
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConversionError::InvalidConfig(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level, valid_levels
            )));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConversionError::InvalidConfig(format!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format, valid_formats
            )));
        }

        Ok(())
    }

    /// Get log level from environment or config
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.conversion.root_table, "root");
        assert_eq!(config.conversion.preview_row_limit, 100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = AppConfig::default();
        config.conversion.max_depth = 0;
        assert!(matches!(config.validate(), Err(ConversionError::Validation(_))));

        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(matches!(config.validate(), Err(ConversionError::InvalidConfig(_))));
    }

    #[test]
    fn test_unreadable_file_is_invalid_config() {
        let err = AppConfig::load_from(Some(Path::new("no/such/settings.toml"))).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidConfig(_)));
    }
}
