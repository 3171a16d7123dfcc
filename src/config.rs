// ABOUTME: Parses data-explorer configuration files
// ABOUTME: Converts TOML format into connection, import and export settings

use crate::db::Dialect;
use crate::error::ExplorerError;
use crate::export::ExportFormat;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataExplorerConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    /// Driver tag (`sqlite`, `mysql`, `pgsql`, `sqlsrv`); inferred from `url` when absent
    #[serde(default)]
    pub dialect: Option<String>,
    /// PostgreSQL schema to browse
    #[serde(default)]
    pub schema: Option<String>,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            dialect: None,
            schema: None,
        }
    }

    pub fn resolve_dialect(&self) -> Result<Dialect, ExplorerError> {
        match self.dialect.as_deref() {
            Some(tag) => Dialect::from_tag(tag),
            None => Dialect::infer_from_url(&self.url)
                .ok_or_else(|| ExplorerError::UnsupportedDialect(self.url_scheme())),
        }
    }

    pub fn postgres_schema(&self) -> &str {
        self.schema.as_deref().unwrap_or("public")
    }

    fn url_scheme(&self) -> String {
        self.url
            .split_once("://")
            .map(|(scheme, _)| scheme.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub default_format: ExportFormat,
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

pub fn load_config_from_file(path: &str) -> Result<DataExplorerConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path))?;
    let parsed: DataExplorerConfig =
        toml::from_str(&raw).with_context(|| format!("Failed to parse TOML config at {}", path))?;

    if parsed.import.batch_size == 0 {
        anyhow::bail!("import.batch_size must be at least 1 in {}", path);
    }

    Ok(parsed)
}
