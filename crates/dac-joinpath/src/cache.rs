//! Per-database graph cache.
//!
//! The cache holds at most one graph per database, tagged with the
//! fingerprint of the schema it was built from. A lookup with a different
//! fingerprint rebuilds and replaces the entry. Builds for one database are
//! single-flight: concurrent callers that miss wait on the database's build
//! guard and then pick up the graph the first caller stored.
//!
//! Cached graphs are immutable and handed out as `Arc`s, so readers never
//! hold a lock while they search.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use dac_core::{ForeignKeyEdge, JoinGraphConfig, Table};

use crate::error::{JoinPathError, Result};
use crate::fingerprint::SchemaFingerprint;
use crate::graph::AdjacencyGraph;

/// A built graph and the schema fingerprint it corresponds to.
#[derive(Debug)]
pub struct CachedGraph {
    pub database_id: String,
    pub fingerprint: SchemaFingerprint,
    pub graph: Arc<AdjacencyGraph>,
    pub built_at: DateTime<Utc>,
}

/// Counters exposed for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub builds: u64,
    pub entries: usize,
}

/// Injectable single-flight cache of foreign-key graphs.
pub struct GraphCache {
    limits: JoinGraphConfig,
    entries: RwLock<HashMap<String, Arc<CachedGraph>>>,
    build_guards: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    hits: AtomicU64,
    builds: AtomicU64,
}

impl GraphCache {
    /// Create an empty cache whose builds are bounded by `limits`.
    pub fn new(limits: JoinGraphConfig) -> Self {
        Self {
            limits,
            entries: RwLock::new(HashMap::new()),
            build_guards: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            builds: AtomicU64::new(0),
        }
    }

    pub fn limits(&self) -> &JoinGraphConfig {
        &self.limits
    }

    /// Return the graph for `database_id`, building it if the cached entry is
    /// missing or was built from a different schema.
    ///
    /// A failed build leaves any existing entry in place.
    pub fn get_or_build(
        &self,
        database_id: &str,
        tables: &[Table],
        foreign_keys: &[ForeignKeyEdge],
    ) -> Result<Arc<AdjacencyGraph>> {
        self.get_or_build_entry(database_id, tables, foreign_keys)
            .map(|entry| Arc::clone(&entry.graph))
    }

    /// Like [`GraphCache::get_or_build`], returning the whole cache entry.
    pub fn get_or_build_entry(
        &self,
        database_id: &str,
        tables: &[Table],
        foreign_keys: &[ForeignKeyEdge],
    ) -> Result<Arc<CachedGraph>> {
        // Validate before lookup: the fingerprint ignores columns and
        // duplicate table names.
        AdjacencyGraph::validate(tables, foreign_keys, &self.limits)?;
        let fingerprint = SchemaFingerprint::compute(tables, foreign_keys);

        if let Some(entry) = self.lookup(database_id, &fingerprint)? {
            return Ok(entry);
        }

        let guard = self.build_guard(database_id)?;
        let _building = guard.lock().map_err(|_| JoinPathError::LockPoisoned)?;

        // Another caller may have finished the build while we waited.
        if let Some(entry) = self.lookup(database_id, &fingerprint)? {
            return Ok(entry);
        }

        let graph = AdjacencyGraph::build(tables, foreign_keys, &self.limits)?;
        self.builds.fetch_add(1, Ordering::Relaxed);

        let entry = Arc::new(CachedGraph {
            database_id: database_id.to_string(),
            fingerprint,
            graph: Arc::new(graph),
            built_at: Utc::now(),
        });

        let previous = self
            .entries
            .write()
            .map_err(|_| JoinPathError::LockPoisoned)?
            .insert(database_id.to_string(), Arc::clone(&entry));

        match previous {
            Some(previous) => tracing::warn!(
                database = %database_id,
                old_fingerprint = %previous.fingerprint,
                new_fingerprint = %entry.fingerprint,
                "Schema changed, replaced cached foreign key graph"
            ),
            None => tracing::info!(
                database = %database_id,
                fingerprint = %entry.fingerprint,
                tables = entry.graph.node_count(),
                foreign_keys = entry.graph.edge_count(),
                "Cached foreign key graph"
            ),
        }

        Ok(entry)
    }

    /// The current entry for a database, whatever its fingerprint.
    pub fn get(&self, database_id: &str) -> Result<Option<Arc<CachedGraph>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| JoinPathError::LockPoisoned)?;
        Ok(entries.get(database_id).cloned())
    }

    /// Drop the entry for one database. Returns whether one existed.
    pub fn invalidate(&self, database_id: &str) -> Result<bool> {
        let removed = self
            .entries
            .write()
            .map_err(|_| JoinPathError::LockPoisoned)?
            .remove(database_id)
            .is_some();
        self.prune_guards(|id| id == database_id)?;
        if removed {
            tracing::debug!(database = %database_id, "Invalidated cached foreign key graph");
        }
        Ok(removed)
    }

    /// Drop every entry.
    pub fn clear(&self) -> Result<()> {
        self.entries
            .write()
            .map_err(|_| JoinPathError::LockPoisoned)?
            .clear();
        self.prune_guards(|_| true)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let entries = self
            .entries
            .read()
            .map_err(|_| JoinPathError::LockPoisoned)?
            .len();
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            builds: self.builds.load(Ordering::Relaxed),
            entries,
        })
    }

    fn lookup(
        &self,
        database_id: &str,
        fingerprint: &SchemaFingerprint,
    ) -> Result<Option<Arc<CachedGraph>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| JoinPathError::LockPoisoned)?;
        match entries.get(database_id) {
            Some(entry) if entry.fingerprint == *fingerprint => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(database = %database_id, "Foreign key graph cache hit");
                Ok(Some(Arc::clone(entry)))
            }
            _ => Ok(None),
        }
    }

    fn build_guard(&self, database_id: &str) -> Result<Arc<Mutex<()>>> {
        let mut guards = self
            .build_guards
            .lock()
            .map_err(|_| JoinPathError::LockPoisoned)?;
        Ok(Arc::clone(
            guards.entry(database_id.to_string()).or_default(),
        ))
    }
}

impl GraphCache {
    /// Drop build guards of the selected databases that no caller holds.
    /// Guards are handed out under the map lock, so a count of one means idle.
    fn prune_guards(&self, selected: impl Fn(&str) -> bool) -> Result<()> {
        self.build_guards
            .lock()
            .map_err(|_| JoinPathError::LockPoisoned)?
            .retain(|id, guard| !selected(id.as_str()) || Arc::strong_count(guard) > 1);
        Ok(())
    }

    #[cfg(test)]
    fn guard_count(&self) -> usize {
        self.build_guards.lock().map(|g| g.len()).unwrap_or(0)
    }
}

impl Default for GraphCache {
    fn default() -> Self {
        Self::new(JoinGraphConfig::default())
    }
}
