// ABOUTME: Error taxonomy for catalog, export and import operations
// ABOUTME: Driver failures arrive as anyhow errors and are wrapped as Database

use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to callers of the catalog, export and import engines
#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("Unsupported database driver: {0}")]
    UnsupportedDialect(String),

    #[error("Selected table does not exist: {0}")]
    TableNotFound(String),

    #[error("Column '{column}' does not exist on table '{table}'")]
    ColumnMismatch { table: String, column: String },

    #[error("Unsupported file format: {0}")]
    UnsupportedFileFormat(String),

    #[error("Validation failed")]
    ValidationFailed(Vec<RowError>),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Failed to generate {format} file: {message}")]
    Encoding { format: String, message: String },

    #[error("Transaction failed: {0:#}")]
    Transaction(anyhow::Error),

    #[error("{0:#}")]
    Database(#[from] anyhow::Error),
}

impl ExplorerError {
    pub fn encoding(format: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ExplorerError::Encoding {
            format: format.into(),
            message: err.to_string(),
        }
    }

    /// True for errors caused by the caller's input rather than the database
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ExplorerError::TableNotFound(_)
                | ExplorerError::ColumnMismatch { .. }
                | ExplorerError::UnsupportedFileFormat(_)
                | ExplorerError::ValidationFailed(_)
                | ExplorerError::InvalidRequest(_)
        )
    }
}

/// All coercion failures collected for one imported row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub row_index: usize,
    pub messages: Vec<String>,
}

/// A single field that could not be cast to its column's type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CoercionError(pub String);

impl CoercionError {
    pub fn new(message: impl Into<String>) -> Self {
        CoercionError(message.into())
    }
}

pub type Result<T, E = ExplorerError> = std::result::Result<T, E>;
