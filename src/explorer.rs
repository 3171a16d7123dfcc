// ABOUTME: Request/response boundary for the index, export and import endpoints
// ABOUTME: Opens one connection per call and shapes results into status, headers and body

use crate::catalog::{Catalog, TableDescriptor};
use crate::config::DataExplorerConfig;
use crate::db::{self, Connection};
use crate::error::{ExplorerError, RowError};
use crate::export::{self, format_options, ExportRequest, FormatOption};
use crate::filters::{operator_options, OperatorOption};
use crate::import::{self, ImportOptions, ImportRequest, UploadedFile};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};

/// Data shown on the explorer's landing page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexResponse {
    pub tables: Vec<TableDescriptor>,
    pub export_formats: Vec<FormatOption>,
    pub operators: Vec<OperatorOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(JsonValue),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: ResponseBody,
}

impl ApiResponse {
    fn json(status: u16, body: JsonValue) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: ResponseBody::Json(body),
        }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, json!({ "error": message.into() }))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Multipart import form: mapping and options arrive JSON-encoded
#[derive(Debug, Clone, PartialEq)]
pub struct ImportForm {
    pub file: UploadedFile,
    pub table: String,
    pub mapping: String,
    pub options: String,
}

pub struct Explorer {
    config: DataExplorerConfig,
}

impl Explorer {
    pub fn new(config: DataExplorerConfig) -> Self {
        Self { config }
    }

    async fn open(&self) -> Result<(Box<dyn Connection>, Catalog), ExplorerError> {
        let catalog = Catalog::for_config(&self.config.database)?;
        let conn = db::connect(&self.config.database).await?;
        Ok((conn, catalog))
    }

    pub async fn index(&self) -> IndexResponse {
        let mut response = IndexResponse {
            tables: Vec::new(),
            export_formats: format_options(),
            operators: operator_options(),
            error: None,
        };

        let listed = match self.open().await {
            Ok((mut conn, catalog)) => catalog.list_tables(conn.as_mut()).await,
            Err(e) => Err(e),
        };

        match listed {
            Ok(tables) if tables.is_empty() => {
                response.error = Some("No tables found in the database.".to_string());
            }
            Ok(tables) => response.tables = tables,
            Err(e) => {
                tracing::error!("Failed to load catalog: {}", e);
                response.error = Some(e.to_string());
            }
        }

        response
    }

    /// Handle an export request body
    pub async fn export(&self, body: &JsonValue) -> ApiResponse {
        let request: ExportRequest = match serde_json::from_value(body.clone()) {
            Ok(request) => request,
            Err(e) => return ApiResponse::error(500, format!("Export failed: {}", e)),
        };

        let result = match self.open().await {
            Ok((mut conn, catalog)) => export::export(conn.as_mut(), &catalog, &request).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(file) => ApiResponse {
                status: 200,
                headers: vec![
                    ("Content-Type".to_string(), file.content_type.to_string()),
                    ("Content-Disposition".to_string(), file.content_disposition()),
                ],
                body: ResponseBody::Bytes(file.bytes),
            },
            Err(e) => {
                tracing::error!("Export of '{}' failed: {}", request.table, e);
                ApiResponse::error(500, format!("Export failed: {}", e))
            }
        }
    }

    /// Handle an import form
    pub async fn import(&self, form: ImportForm) -> ApiResponse {
        let request = match self.import_request(form) {
            Ok(request) => request,
            Err(e) => return ApiResponse::error(422, e.to_string()),
        };

        let result = match self.open().await {
            Ok((mut conn, catalog)) => {
                import::import(conn.as_mut(), &catalog, &request, &self.config.import).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => ApiResponse::json(
                200,
                json!({
                    "message": "Import completed successfully",
                    "imported": outcome.imported_count,
                }),
            ),
            Err(ExplorerError::ValidationFailed(errors)) => ApiResponse::json(
                422,
                json!({
                    "error": "Validation failed",
                    "details": validation_details(&errors),
                }),
            ),
            Err(ExplorerError::TableNotFound(_)) => {
                ApiResponse::error(422, "Selected table does not exist")
            }
            Err(e) if e.is_client_error() => ApiResponse::error(422, e.to_string()),
            Err(e) => {
                tracing::error!("Import into '{}' failed: {}", request.table, e);
                ApiResponse::error(500, format!("Import failed: {}", e))
            }
        }
    }

    fn import_request(&self, form: ImportForm) -> Result<ImportRequest, ExplorerError> {
        if form.table.trim().is_empty() {
            return Err(ExplorerError::InvalidRequest(
                "The table field is required.".to_string(),
            ));
        }

        let mapping = import::parse_mapping(&form.mapping)?;
        let options: ImportOptions = serde_json::from_str(&form.options)
            .map_err(|e| ExplorerError::InvalidRequest(format!("Invalid import options: {}", e)))?;

        Ok(ImportRequest {
            file: form.file,
            table: form.table,
            mapping,
            options,
        })
    }
}

/// Row errors as shown to operators: 1-based row numbers
fn validation_details(errors: &[RowError]) -> JsonValue {
    JsonValue::Array(
        errors
            .iter()
            .map(|e| json!({ "row": e.row_index + 1, "errors": e.messages }))
            .collect(),
    )
}
