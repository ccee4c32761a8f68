//! `dac snapshot` command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use dac_adapter_pg::{PostgresFetcherOptions, PostgresSchemaFetcher};
use dac_core::DacConfig;
use dac_joinpath::SchemaFetcher;

pub async fn run(config: &DacConfig, database: &str, out: Option<&Path>) -> Result<()> {
    let fetcher = PostgresSchemaFetcher::new(config.clone(), PostgresFetcherOptions::default());
    let snapshot = fetcher.fetch(database).await?;
    let json = serde_json::to_string_pretty(&snapshot)?;

    match out {
        Some(path) => {
            std::fs::write(path, json.as_bytes())
                .with_context(|| format!("Failed to write snapshot to {:?}", path))?;
            tracing::info!(
                database = %database,
                tables = snapshot.tables.len(),
                foreign_keys = snapshot.foreign_keys.len(),
                path = %path.display(),
                "Wrote schema snapshot"
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}
