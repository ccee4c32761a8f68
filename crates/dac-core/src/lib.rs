// Configuration types shared across all dac crates
pub mod config;

// Normalized schema shape delivered by schema fetchers
pub mod schema;

pub use config::{
    ConfigError, DacConfig, DatabaseConfig, JoinGraphConfig, ObservabilityConfig,
};
pub use schema::{ForeignKeyEdge, SchemaSnapshot, Table};
