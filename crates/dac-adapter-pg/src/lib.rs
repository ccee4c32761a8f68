use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use dac_core::{DacConfig, DatabaseConfig, SchemaSnapshot};
use dac_joinpath::SchemaFetcher;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub mod introspect;

pub use introspect::{ColumnRow, ForeignKeyRow, TableRow, introspect_schema, normalize};

#[derive(Debug, Clone, Copy)]
pub struct PostgresFetcherOptions {
    pub max_connections: u32,
}

impl Default for PostgresFetcherOptions {
    fn default() -> Self {
        Self { max_connections: 2 }
    }
}

/// Schema fetcher backed by the databases of a [`DacConfig`] registry.
///
/// One connection pool is opened lazily per database and reused by later
/// fetches.
pub struct PostgresSchemaFetcher {
    config: DacConfig,
    options: PostgresFetcherOptions,
    pools: tokio::sync::Mutex<HashMap<String, PgPool>>,
}

impl PostgresSchemaFetcher {
    pub fn new(config: DacConfig, options: PostgresFetcherOptions) -> Self {
        Self {
            config,
            options,
            pools: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Fetcher for a single database URL, registered under `database_id`.
    pub fn from_url(database_id: impl Into<String>, database_url: impl Into<String>) -> Self {
        let config = DacConfig {
            databases: BTreeMap::from([(
                database_id.into(),
                DatabaseConfig::from_url(database_url),
            )]),
            ..Default::default()
        };
        Self::new(config, PostgresFetcherOptions::default())
    }

    async fn pool(&self, database_id: &str) -> anyhow::Result<PgPool> {
        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(database_id) {
            return Ok(pool.clone());
        }

        let database = self.config.database(database_id)?;
        let url = database.connection_string().ok_or_else(|| {
            anyhow::anyhow!(
                "database '{}' has no connection URL (set database_url{})",
                database_id,
                database
                    .database_url_env
                    .as_deref()
                    .map(|var| format!(" or the {var} environment variable"))
                    .unwrap_or_default()
            )
        })?;

        tracing::info!(database = %database_id, "Connecting to Postgres");
        let pool = PgPoolOptions::new()
            .max_connections(self.options.max_connections)
            .connect(&url)
            .await?;
        pools.insert(database_id.to_string(), pool.clone());
        Ok(pool)
    }
}

#[async_trait]
impl SchemaFetcher for PostgresSchemaFetcher {
    async fn fetch(&self, database_id: &str) -> anyhow::Result<SchemaSnapshot> {
        let pool = self.pool(database_id).await?;
        let snapshot = introspect_schema(&pool).await?;
        tracing::debug!(
            database = %database_id,
            tables = snapshot.tables.len(),
            foreign_keys = snapshot.foreign_keys.len(),
            "Introspected schema"
        );
        Ok(snapshot)
    }
}
