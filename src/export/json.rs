// ABOUTME: JSON encoder for exported rows
// ABOUTME: Emits an array of objects keyed by column name with native JSON typing

use crate::db::Value;
use crate::error::{ExplorerError, Result};
use serde_json::{Map, Value as JsonValue};

pub fn encode(columns: &[String], rows: &[Vec<Value>]) -> Result<Vec<u8>> {
    let records: Vec<JsonValue> = rows
        .iter()
        .map(|row| {
            let object: Map<String, JsonValue> = columns
                .iter()
                .cloned()
                .zip(row.iter().map(Value::to_json))
                .collect();
            JsonValue::Object(object)
        })
        .collect();

    serde_json::to_vec_pretty(&records).map_err(|e| ExplorerError::encoding("json", e))
}
