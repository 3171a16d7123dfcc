// ABOUTME: Tables command: prints the catalog of exposed tables
// ABOUTME: Human-readable listing by default, the index response as JSON on request

use crate::config::DataExplorerConfig;
use crate::explorer::Explorer;
use anyhow::{Context, Result};

pub async fn tables(config: DataExplorerConfig, as_json: bool) -> Result<()> {
    let index = Explorer::new(config).index().await;

    if as_json {
        let rendered =
            serde_json::to_string_pretty(&index).context("Failed to serialize table catalog")?;
        println!("{}", rendered);
        return Ok(());
    }

    if let Some(error) = &index.error {
        println!("{}", error);
    }

    for table in &index.tables {
        println!();
        match &table.error {
            Some(error) => println!("{}  (unavailable: {})", table.name, error),
            None => println!("{}  ({} rows)", table.name, table.row_count),
        }
        for column in &table.columns {
            println!(
                "  {:<32} {:<24} {}",
                column.name,
                column.semantic_type.to_string(),
                column.description
            );
        }
    }

    Ok(())
}
