//! Database registry entries.
//!
//! Each named database is reached through a connection URL. Two configuration
//! methods are supported:
//! 1. `database_url_env` - reference an environment variable
//! 2. `database_url` - provide the URL directly

use serde::{Deserialize, Serialize};

/// Connection settings for one named database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Environment variable name containing the connection URL.
    /// Highest precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url_env: Option<String>,

    /// Full connection URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    /// Short description of the dataset/schema.
    #[serde(default)]
    pub description: String,
}

impl DatabaseConfig {
    /// Create a config from a direct URL.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            database_url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Resolve the connection URL.
    ///
    /// Precedence:
    /// 1. database_url_env (environment variable, when set)
    /// 2. database_url (direct URL)
    pub fn connection_string(&self) -> Option<String> {
        if let Some(env_var) = &self.database_url_env
            && let Ok(url) = std::env::var(env_var)
        {
            return Some(url);
        }

        self.database_url.clone()
    }

    /// Check if this configuration reads its URL from the environment.
    pub fn uses_env_credentials(&self) -> bool {
        self.database_url_env.is_some()
    }
}
