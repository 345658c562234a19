use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use json_to_sqlite::config::AppConfig;
use json_to_sqlite::export::{self, OutputFormat};
use json_to_sqlite::logging::init_logging;
use json_to_sqlite::models::{Cell, ConversionReport, TableRows};
use json_to_sqlite::validation::InputValidator;
use json_to_sqlite::{ConversionOptions, Converter, RelationalStore, SqliteStore};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file layered over config/default and config/local
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a JSON document into a SQLite database
    Convert {
        /// JSON document to convert
        input: PathBuf,

        /// Where to write the database (defaults to database.output_path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Replace the output file if it exists
        #[arg(short, long)]
        force: bool,

        /// Print every generated table with its schema and rows
        #[arg(long)]
        show: bool,

        /// Rows shown per table with --show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print the conversion report as JSON
        #[arg(long)]
        json_report: bool,
    },
    /// List the tables of a database
    Tables {
        /// Database file
        database: PathBuf,
    },
    /// Show the columns of a table
    Schema {
        /// Database file
        database: PathBuf,

        /// Table name
        table: String,
    },
    /// Show the rows of a table
    Rows {
        /// Database file
        database: PathBuf,

        /// Table name
        table: String,

        /// Maximum number of rows
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (txt, csv or json)
        #[arg(short, long, default_value = "txt")]
        format: OutputFormat,
    },
    /// Export the rows of a table to a file
    Export {
        /// Database file
        database: PathBuf,

        /// Table name
        table: String,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Output format (defaults to the output file extension, then csv)
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// Maximum number of rows (all rows if omitted)
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load_from(cli.config.as_deref())?;

    // Initialize logging
    let log_file = config.logging.file_path.as_deref().map(Path::new);
    let _log_guard = init_logging(Some(&config.get_log_level()), log_file, &config.logging.format)?;

    info!("Starting json-to-sqlite");

    // Process command
    match &cli.command {
        Commands::Convert {
            input,
            output,
            force,
            show,
            limit,
            json_report,
        } => convert(&config, input, output.as_deref(), *force, *show, *limit, *json_report)?,
        Commands::Tables { database } => list_tables(database)?,
        Commands::Schema { database, table } => show_schema(database, table)?,
        Commands::Rows {
            database,
            table,
            limit,
            format,
        } => show_rows(&config, database, table, *limit, *format)?,
        Commands::Export {
            database,
            table,
            output,
            format,
            limit,
        } => export_table(database, table, output, *format, *limit)?,
    }

    Ok(())
}

/// Convert a JSON file and write the resulting database
fn convert(
    config: &AppConfig, input: &Path, output: Option<&Path>, force: bool, show: bool, limit: Option<usize>,
    json_report: bool,
) -> Result<()> {
    InputValidator::validate_input_path(input)?;
    let output = output.map_or_else(|| PathBuf::from(&config.database.output_path), Path::to_path_buf);
    InputValidator::validate_output_path(&output)?;

    let overwrite = force || config.database.overwrite;
    if output.exists() && !overwrite {
        bail!("{} already exists (use --force to replace it)", output.display());
    }

    let limit = limit.unwrap_or(config.conversion.preview_row_limit);
    InputValidator::validate_row_limit(limit)?;

    info!("Converting {}", input.display());
    let mut converter = Converter::new(ConversionOptions::from(&config.conversion));
    let conversion = converter
        .run_file(input)
        .with_context(|| format!("Failed to convert {}", input.display()))?;

    if json_report {
        println!("{}", serde_json::to_string_pretty(&conversion.report)?);
    } else {
        print_report(&conversion.report);
    }

    if show {
        for table in conversion.store.list_tables()? {
            print_table(&conversion.store, &table, limit)?;
        }
    }

    let written = conversion
        .store
        .persist(&output, overwrite)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Database written to {}", written.display());

    Ok(())
}

fn print_report(report: &ConversionReport) {
    println!("Tables created: {}", report.tables_created.len());
    for table in &report.tables_created {
        println!("  {table}");
    }
    println!("Rows inserted: {}", report.rows_inserted);
    if report.rows_skipped > 0 {
        println!("Objects without columns skipped: {}", report.rows_skipped);
    }
    if report.fields_dropped > 0 {
        println!("Fields without a column dropped: {}", report.fields_dropped);
    }
    if !report.is_clean() {
        warn!("{} rows could not be inserted", report.failures.len());
        println!("Rows skipped after errors: {}", report.failures.len());
        for failure in &report.failures {
            println!("  {} at {}: {}", failure.table, display_pointer(&failure.pointer), failure.message);
        }
    }
}

fn display_pointer(pointer: &str) -> &str {
    if pointer.is_empty() {
        "/"
    } else {
        pointer
    }
}

fn print_table(store: &impl RelationalStore, table: &str, limit: usize) -> Result<()> {
    println!();
    println!("Table: {table}");
    println!();
    write_schema(store, table)?;
    println!();

    let rows = store.table_rows(table, limit)?;
    if rows.is_empty() {
        println!("No data in this table.");
    } else {
        println!("Data (limited to {limit} rows):");
        export::write_table(&rows, OutputFormat::Txt, io::stdout().lock())?;
    }
    Ok(())
}

fn write_schema(store: &impl RelationalStore, table: &str) -> Result<()> {
    let columns = store.table_schema(table)?;
    let grid = TableRows {
        columns: ["ID", "Name", "Type", "NotNull", "DefaultValue", "PK"]
            .iter()
            .map(ToString::to_string)
            .collect(),
        rows: columns
            .into_iter()
            .map(|c| {
                vec![
                    Cell::Integer(c.position),
                    Cell::Text(c.name),
                    Cell::Text(c.declared_type),
                    Cell::Integer(i64::from(c.not_null)),
                    c.default_value.map_or(Cell::Null, Cell::Text),
                    Cell::Integer(i64::from(c.primary_key)),
                ]
            })
            .collect(),
    };
    export::write_table(&grid, OutputFormat::Txt, io::stdout().lock())?;
    Ok(())
}

fn list_tables(database: &Path) -> Result<()> {
    let store = SqliteStore::open(database)?;
    let mut stdout = io::stdout().lock();
    for table in store.list_tables()? {
        writeln!(stdout, "{table}")?;
    }
    Ok(())
}

fn show_schema(database: &Path, table: &str) -> Result<()> {
    let store = SqliteStore::open(database)?;
    write_schema(&store, table)
}

fn show_rows(config: &AppConfig, database: &Path, table: &str, limit: Option<usize>, format: OutputFormat) -> Result<()> {
    let limit = limit.unwrap_or(config.conversion.preview_row_limit);
    InputValidator::validate_row_limit(limit)?;

    let store = SqliteStore::open(database)?;
    let rows = store.table_rows(table, limit)?;
    export::write_table(&rows, format, io::stdout().lock())?;
    Ok(())
}

fn export_table(
    database: &Path, table: &str, output: &Path, format: Option<OutputFormat>, limit: Option<usize>,
) -> Result<()> {
    InputValidator::validate_output_path(output)?;
    let format = format
        .or_else(|| output.extension().and_then(|e| e.to_str()).and_then(|e| e.parse().ok()))
        .unwrap_or(OutputFormat::Csv);

    let store = SqliteStore::open(database)?;
    let rows: TableRows = store.table_rows(table, limit.unwrap_or(usize::MAX))?;
    let path = export::write_table_to_file(&rows, format, output)?;
    info!("Exported {} rows from {} as {}", rows.len(), table, format);
    println!("Exported {} rows to {}", rows.len(), path.display());
    Ok(())
}
