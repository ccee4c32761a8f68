//! Configuration types for dac.
//!
//! Configuration is loaded from a single YAML file (`dac.yaml` by default).
//! Every section is optional and falls back to its defaults.
//!
//! ```yaml
//! databases:
//!   shop:
//!     database_url_env: SHOP_DATABASE_URL
//!     description: Orders and customers
//! join_graph:
//!   max_tables: 2000
//! observability:
//!   log_level: debug
//! ```

pub mod database;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub use database::DatabaseConfig;

/// Complete dac configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DacConfig {
    /// Named databases available to the agent.
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseConfig>,

    /// Join-path engine limits.
    #[serde(default)]
    pub join_graph: JoinGraphConfig,

    /// Logging configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Defensive caps for the join-path engine.
///
/// Foreign-key graphs are expected to hold tens to low hundreds of tables.
/// Inputs above these limits are rejected instead of searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinGraphConfig {
    /// Maximum number of tables in one graph.
    #[serde(default = "default_max_tables")]
    pub max_tables: usize,

    /// Maximum number of foreign keys in one graph.
    #[serde(default = "default_max_foreign_keys")]
    pub max_foreign_keys: usize,

    /// Maximum number of tables in one multi-table join request.
    #[serde(default = "default_max_terminals")]
    pub max_terminals: usize,
}

impl Default for JoinGraphConfig {
    fn default() -> Self {
        Self {
            max_tables: default_max_tables(),
            max_foreign_keys: default_max_foreign_keys(),
            max_terminals: default_max_terminals(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Default log filter, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// Default value functions
fn default_max_tables() -> usize {
    10_000
}

fn default_max_foreign_keys() -> usize {
    50_000
}

fn default_max_terminals() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown database '{name}'. Available: {available}")]
    UnknownDatabase { name: String, available: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DacConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file when it exists, otherwise return defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.join_graph;
        if limits.max_tables == 0 || limits.max_foreign_keys == 0 {
            return Err(ConfigError::Config(
                "join_graph limits must be greater than zero".to_string(),
            ));
        }
        if limits.max_terminals < 3 {
            return Err(ConfigError::Config(
                "join_graph.max_terminals must allow at least 3 tables".to_string(),
            ));
        }
        Ok(())
    }

    /// Names of the configured databases, sorted.
    pub fn database_names(&self) -> Vec<&str> {
        self.databases.keys().map(String::as_str).collect()
    }

    /// `(name, description)` pairs for every configured database.
    pub fn database_summary(&self) -> Vec<(&str, &str)> {
        self.databases
            .iter()
            .map(|(name, db)| (name.as_str(), db.description.as_str()))
            .collect()
    }

    /// Get a database by name.
    pub fn database(&self, name: &str) -> Result<&DatabaseConfig, ConfigError> {
        self.databases
            .get(name)
            .ok_or_else(|| ConfigError::UnknownDatabase {
                name: name.to_string(),
                available: self.database_names().join(", "),
            })
    }
}
