// ABOUTME: CSV encoder for exported rows
// ABOUTME: Writes the selected column names as the header row, then one record per row

use crate::db::Value;
use crate::error::{ExplorerError, Result};

pub fn encode(columns: &[String], rows: &[Vec<Value>]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(columns)
        .map_err(|e| ExplorerError::encoding("csv", e))?;

    for row in rows {
        writer
            .write_record(row.iter().map(|value| value.to_string()))
            .map_err(|e| ExplorerError::encoding("csv", e))?;
    }

    writer
        .into_inner()
        .map_err(|e| ExplorerError::encoding("csv", e.error()))
}
