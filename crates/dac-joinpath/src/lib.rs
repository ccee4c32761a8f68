//! dac Join-Path Engine
//!
//! Turns a database's foreign-key constraints into a graph, caches that graph
//! per database, and answers which joins connect a set of tables.
//!
//! - [`graph`]: compact, deterministic adjacency representation
//! - [`cache`]: per-database single-flight cache keyed by schema fingerprint
//! - [`path`]: shortest path between two tables
//! - [`steiner`]: approximate join network for three or more tables
//! - [`steps`]: join steps with direction and column mappings, SQL rendering
//! - [`engine`]: facade combining the cache with a schema fetcher
//!
//! ```
//! use dac_core::{ForeignKeyEdge, JoinGraphConfig, Table};
//! use dac_joinpath::{AdjacencyGraph, shortest_path};
//!
//! let tables = [
//!     Table::new("customers", ["id"]),
//!     Table::new("orders", ["id", "customer_id"]),
//! ];
//! let fks = [ForeignKeyEdge::new("orders", ["customer_id"], "customers", ["id"])];
//! let graph = AdjacencyGraph::build(&tables, &fks, &JoinGraphConfig::default()).unwrap();
//!
//! let path = shortest_path(&graph, "customers", "orders").unwrap();
//! assert_eq!(
//!     path.to_sql(),
//!     "FROM \"customers\"\nJOIN \"orders\" ON \"customers\".\"id\" = \"orders\".\"customer_id\""
//! );
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod graph;
pub mod path;
pub mod steiner;
pub mod steps;

pub use cache::{CacheStats, CachedGraph, GraphCache};
pub use engine::{JoinPathEngine, SchemaFetcher, StaticSchemaFetcher, find_join_path_in};
pub use error::{JoinPathError, Result};
pub use fingerprint::SchemaFingerprint;
pub use graph::{AdjacencyGraph, Adjacent, EdgeId, NodeId};
pub use path::shortest_path;
pub use steiner::approximate_join_network;
pub use steps::{JoinDirection, JoinPath, JoinStep, Traversal, to_join_steps};
