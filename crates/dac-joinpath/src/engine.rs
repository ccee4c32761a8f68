//! Join-path engine facade.
//!
//! The engine ties a [`GraphCache`] to a [`SchemaFetcher`]. A request for a
//! database whose graph is not cached fetches the schema once, even when many
//! requests for that database arrive together, then builds through the cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dac_core::{ForeignKeyEdge, SchemaSnapshot, Table};

use crate::cache::GraphCache;
use crate::error::{JoinPathError, Result};
use crate::graph::AdjacencyGraph;
use crate::path::shortest_path;
use crate::steiner::approximate_join_network;
use crate::steps::JoinPath;

/// Source of table and foreign-key metadata for a database.
///
/// Implementations perform the blocking introspection work; the engine only
/// calls them on a cache miss or an explicit refresh.
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    /// Load the normalized schema of one database.
    async fn fetch(&self, database_id: &str) -> anyhow::Result<SchemaSnapshot>;
}

/// Fetcher over schemas held in memory, e.g. loaded from snapshot files.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaFetcher {
    schemas: BTreeMap<String, SchemaSnapshot>,
}

impl StaticSchemaFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the schema served for `database_id`.
    pub fn with_database(mut self, database_id: impl Into<String>, schema: SchemaSnapshot) -> Self {
        self.schemas.insert(database_id.into(), schema);
        self
    }
}

#[async_trait]
impl SchemaFetcher for StaticSchemaFetcher {
    async fn fetch(&self, database_id: &str) -> anyhow::Result<SchemaSnapshot> {
        self.schemas.get(database_id).cloned().ok_or_else(|| {
            anyhow::anyhow!(
                "unknown database '{}'. Available: {}",
                database_id,
                self.schemas.keys().cloned().collect::<Vec<_>>().join(", ")
            )
        })
    }
}

/// Answers join-path requests for any number of databases.
pub struct JoinPathEngine {
    cache: Arc<GraphCache>,
    fetcher: Arc<dyn SchemaFetcher>,
    fetch_guards: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl JoinPathEngine {
    pub fn new(cache: Arc<GraphCache>, fetcher: Arc<dyn SchemaFetcher>) -> Self {
        Self {
            cache,
            fetcher,
            fetch_guards: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &Arc<GraphCache> {
        &self.cache
    }

    /// Build (or reuse) the graph for a schema the caller already holds.
    pub fn get_or_build_graph(
        &self,
        database_id: &str,
        tables: &[Table],
        foreign_keys: &[ForeignKeyEdge],
    ) -> Result<Arc<AdjacencyGraph>> {
        self.cache.get_or_build(database_id, tables, foreign_keys)
    }

    /// The cached graph for a database, fetching its schema on a miss.
    pub async fn graph(&self, database_id: &str) -> Result<Arc<AdjacencyGraph>> {
        if let Some(entry) = self.cache.get(database_id)? {
            return Ok(Arc::clone(&entry.graph));
        }

        let guard = self.fetch_guard(database_id)?;
        let _fetching = guard.lock().await;

        if let Some(entry) = self.cache.get(database_id)? {
            return Ok(Arc::clone(&entry.graph));
        }
        self.load(database_id).await
    }

    /// Re-fetch a database's schema. The graph is rebuilt only if the schema
    /// fingerprint changed.
    pub async fn refresh(&self, database_id: &str) -> Result<Arc<AdjacencyGraph>> {
        let guard = self.fetch_guard(database_id)?;
        let _fetching = guard.lock().await;
        self.load(database_id).await
    }

    /// Drop the cached graph of a database so the next request re-fetches
    /// its schema. Returns whether a graph was cached.
    pub fn invalidate(&self, database_id: &str) -> Result<bool> {
        let removed = self.cache.invalidate(database_id)?;
        let mut guards = self
            .fetch_guards
            .lock()
            .map_err(|_| JoinPathError::LockPoisoned)?;
        // Guards are handed out under this lock, so a count of one means idle.
        if guards
            .get(database_id)
            .is_some_and(|guard| Arc::strong_count(guard) == 1)
        {
            guards.remove(database_id);
        }
        Ok(removed)
    }

    /// Best sequence of joins connecting `table_names`.
    ///
    /// Repeated names are ignored. Two distinct tables get the shortest path
    /// between them, more get an approximate minimal join network.
    pub async fn find_join_path<S: AsRef<str>>(
        &self,
        database_id: &str,
        table_names: &[S],
    ) -> Result<JoinPath> {
        let requested = distinct_tables(table_names);
        check_request(&requested, self.cache.limits().max_terminals)?;

        let graph = self.graph(database_id).await?;
        let path = plan(&graph, &requested)?;

        tracing::debug!(
            database = %database_id,
            tables = requested.len(),
            joins = path.len(),
            "Planned join path"
        );
        Ok(path)
    }

    async fn load(&self, database_id: &str) -> Result<Arc<AdjacencyGraph>> {
        tracing::debug!(database = %database_id, "Fetching schema");
        let schema = self
            .fetcher
            .fetch(database_id)
            .await
            .map_err(|source| JoinPathError::SchemaFetch {
                database: database_id.to_string(),
                source,
            })?;
        self.cache
            .get_or_build(database_id, &schema.tables, &schema.foreign_keys)
    }

    fn fetch_guard(&self, database_id: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut guards = self
            .fetch_guards
            .lock()
            .map_err(|_| JoinPathError::LockPoisoned)?;
        Ok(Arc::clone(
            guards.entry(database_id.to_string()).or_default(),
        ))
    }
}

/// Plan joins over a graph the caller already holds.
pub fn find_join_path_in<S: AsRef<str>>(
    graph: &AdjacencyGraph,
    table_names: &[S],
    max_terminals: usize,
) -> Result<JoinPath> {
    let requested = distinct_tables(table_names);
    check_request(&requested, max_terminals)?;
    plan(graph, &requested)
}

fn plan(graph: &AdjacencyGraph, requested: &[&str]) -> Result<JoinPath> {
    match requested {
        [from, to] => shortest_path(graph, from, to),
        _ => approximate_join_network(graph, requested),
    }
}

fn distinct_tables<S: AsRef<str>>(table_names: &[S]) -> Vec<&str> {
    let mut requested: Vec<&str> = Vec::with_capacity(table_names.len());
    for name in table_names {
        let name = name.as_ref();
        if !requested.contains(&name) {
            requested.push(name);
        }
    }
    requested
}

fn check_request(requested: &[&str], max_terminals: usize) -> Result<()> {
    if requested.len() < 2 {
        return Err(JoinPathError::InvalidRequest(
            "provide at least two distinct table names to compute a join path".to_string(),
        ));
    }
    if requested.len() > max_terminals {
        return Err(JoinPathError::GraphTooLarge {
            what: "requested table",
            count: requested.len(),
            limit: max_terminals,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_tables_keeps_first_occurrence() {
        let names = ["orders", "customers", "orders", "products", "customers"];
        assert_eq!(
            distinct_tables(&names),
            vec!["orders", "customers", "products"]
        );
    }

    #[test]
    fn test_check_request_bounds() {
        assert!(matches!(
            check_request(&["orders"], 8),
            Err(JoinPathError::InvalidRequest(_))
        ));
        assert!(check_request(&["orders", "customers"], 8).is_ok());
        assert!(matches!(
            check_request(&["a", "b", "c", "d"], 3),
            Err(JoinPathError::GraphTooLarge { count: 4, limit: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_invalidate_refetches_and_drops_idle_guard() {
        let schema = SchemaSnapshot::new(
            vec![
                Table::new("customers", ["id"]),
                Table::new("orders", ["id", "customer_id"]),
            ],
            vec![ForeignKeyEdge::new("orders", ["customer_id"], "customers", ["id"])],
        );
        let engine = JoinPathEngine::new(
            Arc::new(GraphCache::default()),
            Arc::new(StaticSchemaFetcher::new().with_database("shop", schema)),
        );

        engine.graph("shop").await.unwrap();
        assert_eq!(engine.fetch_guards.lock().unwrap().len(), 1);

        assert!(engine.invalidate("shop").unwrap());
        assert!(engine.fetch_guards.lock().unwrap().is_empty());
        assert!(engine.cache().get("shop").unwrap().is_none());
        assert!(!engine.invalidate("shop").unwrap());

        engine.graph("shop").await.unwrap();
        assert_eq!(engine.cache().stats().unwrap().builds, 2);
    }

    #[tokio::test]
    async fn test_static_fetcher_unknown_database() {
        let fetcher = StaticSchemaFetcher::new().with_database("shop", SchemaSnapshot::default());
        let err = fetcher.fetch("hr").await.unwrap_err();
        assert_eq!(err.to_string(), "unknown database 'hr'. Available: shop");
    }
}
