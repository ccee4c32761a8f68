//! Error types for the join-path engine.

use thiserror::Error;

/// Errors produced while building foreign-key graphs or searching join paths.
#[derive(Debug, Error)]
pub enum JoinPathError {
    /// The schema references a table or column that does not exist, or a
    /// foreign key is otherwise unusable. The cache is left unmodified.
    #[error("malformed schema: {0}")]
    MalformedSchema(String),

    /// A requested table is not part of the graph.
    #[error("unknown tables: {}. Available tables: {}", .missing.join(", "), .available.join(", "))]
    UnknownTable {
        missing: Vec<String>,
        available: Vec<String>,
    },

    /// The requested tables lie in disconnected components.
    #[error("no join path connects: {}", .tables.join(", "))]
    NoPathFound { tables: Vec<String> },

    /// A configured size cap was exceeded.
    #[error("{what} count {count} exceeds the configured limit of {limit}")]
    GraphTooLarge {
        what: &'static str,
        count: usize,
        limit: usize,
    },

    /// The request itself is unusable (e.g. fewer than two distinct tables).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The schema fetcher failed while loading a database's schema.
    #[error("failed to fetch schema for database '{database}': {source}")]
    SchemaFetch {
        database: String,
        #[source]
        source: anyhow::Error,
    },

    /// A cache lock was poisoned by a panicking builder.
    #[error("graph cache lock poisoned")]
    LockPoisoned,
}

impl JoinPathError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedSchema(message.into())
    }

    pub(crate) fn no_path<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::NoPathFound {
            tables: tables.into_iter().map(Into::into).collect(),
        }
    }
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, JoinPathError>;
