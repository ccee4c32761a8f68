//! CLI command implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use dac_adapter_pg::{PostgresFetcherOptions, PostgresSchemaFetcher};
use dac_core::{DacConfig, SchemaSnapshot};
use dac_joinpath::{GraphCache, JoinPathEngine, SchemaFetcher, StaticSchemaFetcher};

pub mod databases;
pub mod graph;
pub mod join_path;
pub mod snapshot;

/// Where the schema comes from: a configured database or a snapshot file.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// Configured database name (live introspection)
    #[arg(long)]
    pub database: Option<String>,

    /// Schema snapshot JSON file (offline)
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// An engine wired to the selected source, and the database id to query.
pub struct Target {
    pub engine: JoinPathEngine,
    pub database_id: String,
}

impl Target {
    pub fn open(config: &DacConfig, source: &SourceArgs) -> Result<Self> {
        let (database_id, fetcher): (String, Arc<dyn SchemaFetcher>) =
            match (&source.database, &source.snapshot) {
                (Some(database), _) => {
                    config.database(database)?;
                    (
                        database.clone(),
                        Arc::new(PostgresSchemaFetcher::new(
                            config.clone(),
                            PostgresFetcherOptions::default(),
                        )),
                    )
                }
                (None, Some(path)) => {
                    let database_id = snapshot_id(path);
                    let snapshot = load_snapshot(path)?;
                    (
                        database_id.clone(),
                        Arc::new(StaticSchemaFetcher::new().with_database(database_id, snapshot)),
                    )
                }
                (None, None) => anyhow::bail!("either --database or --snapshot is required"),
            };

        let cache = Arc::new(GraphCache::new(config.join_graph));
        Ok(Self {
            engine: JoinPathEngine::new(cache, fetcher),
            database_id,
        })
    }
}

pub fn load_snapshot(path: &Path) -> Result<SchemaSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {:?}", path))?;
    SchemaSnapshot::from_json(&content)
        .with_context(|| format!("Failed to parse snapshot {:?}", path))
}

fn snapshot_id(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;

    use tempfile::NamedTempFile;

    pub const SHOP_SNAPSHOT: &str = r#"{
  "tables": [
    {"name": "customers", "columns": ["id", "name"]},
    {"name": "orders", "columns": ["id", "customer_id"]},
    {"name": "order_items", "columns": ["id", "order_id", "product_id"]},
    {"name": "products", "columns": ["id"]},
    {"name": "employees", "columns": ["id", "manager_id"]}
  ],
  "foreign_keys": [
    {"name": "orders_customer_id_fkey", "from_table": "orders", "from_columns": ["customer_id"], "to_table": "customers", "to_columns": ["id"]},
    {"from_table": "order_items", "from_columns": ["order_id"], "to_table": "orders", "to_columns": ["id"]},
    {"from_table": "order_items", "from_columns": ["product_id"], "to_table": "products", "to_columns": ["id"]},
    {"from_table": "employees", "from_columns": ["manager_id"], "to_table": "employees", "to_columns": ["id"]}
  ]
}"#;

    pub fn snapshot_file() -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("shop")
            .suffix(".json")
            .tempfile()
            .unwrap();
        file.write_all(SHOP_SNAPSHOT.as_bytes()).unwrap();
        file
    }
}
