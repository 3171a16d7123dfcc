// ABOUTME: CLI entry point for data-explorer
// ABOUTME: Parses commands and routes to appropriate handlers

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use data_explorer::commands;
use data_explorer::config::{load_config_from_file, DataExplorerConfig};
use data_explorer::export::ExportFormat;
use data_explorer::import::ImportOptions;
use data_explorer::utils::redact_url;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "data-explorer")]
#[command(about = "Browse database tables, export them to CSV/JSON/XLSX and import files back", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<String>,
    /// Database URL (overrides the config file)
    #[arg(long, global = true)]
    database_url: Option<String>,
    /// Driver tag: sqlite, mysql, pgsql or sqlsrv (inferred from the URL when omitted)
    #[arg(long, global = true)]
    dialect: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tables with their columns and row counts
    Tables {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export selected columns of a table to a file
    Export {
        #[arg(long)]
        table: String,
        /// Columns to export, in output order (comma-separated)
        #[arg(long, value_delimiter = ',', required = true)]
        columns: Vec<String>,
        /// csv, json or xlsx (defaults to [export] default_format)
        #[arg(long, value_parser = parse_format)]
        format: Option<ExportFormat>,
        /// Filter as column:operator[:value], e.g. age:>=:18 (repeatable)
        #[arg(long = "filter")]
        filters: Vec<String>,
        /// Base file name; a timestamp and extension are appended
        #[arg(long)]
        filename: Option<String>,
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Import a CSV, XLSX/XLS or JSON file into a table
    Import {
        #[arg(long)]
        table: String,
        #[arg(long)]
        file: PathBuf,
        /// Column mapping as target=source (repeatable)
        #[arg(long = "map", required = true)]
        mapping: Vec<String>,
        /// Treat the first CSV/XLSX row as data rather than a header
        #[arg(long)]
        no_header: bool,
        /// Roll back the whole import if any row fails validation
        #[arg(long)]
        validate: bool,
        /// Update rows whose KEY column matches instead of inserting them
        #[arg(long, value_name = "KEY")]
        update_key: Option<String>,
    },
}

fn parse_format(raw: &str) -> Result<ExportFormat, String> {
    ExportFormat::parse(raw).ok_or_else(|| format!("unsupported format '{}'", raw))
}

fn resolve_config(cli: &Cli) -> Result<DataExplorerConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from_file(path)?,
        None => DataExplorerConfig::default(),
    };

    if let Some(url) = &cli.database_url {
        config.database.url = url.clone();
    }
    if let Some(dialect) = &cli.dialect {
        config.database.dialect = Some(dialect.clone());
    }

    if config.database.url.trim().is_empty() {
        bail!("No database URL given. Pass --database-url or set [database] url in the config file");
    }

    tracing::debug!("Using database {}", redact_url(&config.database.url));

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Tables { json } => commands::tables(config, json).await,
        Commands::Export {
            table,
            columns,
            format,
            filters,
            filename,
            output_dir,
        } => commands::export(
            &config,
            &table,
            columns,
            format,
            &filters,
            filename,
            &output_dir,
        )
        .await
        .map(|_| ()),
        Commands::Import {
            table,
            file,
            mapping,
            no_header,
            validate,
            update_key,
        } => {
            let mapping = commands::import::parse_mapping_args(&mapping)?;
            let options = ImportOptions {
                skip_header: !no_header,
                validate_data: validate,
                update_existing: update_key.is_some(),
                update_key,
            };
            commands::import(&config, &table, &file, mapping, options)
                .await
                .map(|_| ())
        }
    }
}
