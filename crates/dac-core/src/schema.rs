//! Normalized schema types.
//!
//! Whatever a database introspection layer returns is normalized into these
//! strict shapes before it reaches the join-path engine. Table names are
//! schema-qualified (`public.orders`) when the source database has schemas.

use serde::{Deserialize, Serialize};

/// A table or view known to a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Schema-qualified table name.
    pub name: String,

    /// Column names in ordinal order.
    #[serde(default)]
    pub columns: Vec<String>,
}

impl Table {
    /// Create a table with the given columns.
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether the table declares a column.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// A foreign-key constraint, oriented child (`from`) to parent (`to`).
///
/// Column lists are positional: `from_columns[i]` references `to_columns[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyEdge {
    /// Constraint name, when the database reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub from_table: String,
    pub from_columns: Vec<String>,
    pub to_table: String,
    pub to_columns: Vec<String>,
}

impl ForeignKeyEdge {
    /// Create an unnamed foreign key.
    pub fn new<F, T>(
        from_table: impl Into<String>,
        from_columns: F,
        to_table: impl Into<String>,
        to_columns: T,
    ) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            name: None,
            from_table: from_table.into(),
            from_columns: from_columns.into_iter().map(Into::into).collect(),
            to_table: to_table.into(),
            to_columns: to_columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Attach a constraint name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// True when the table references itself (e.g. `employees.manager_id`).
    pub fn is_self_reference(&self) -> bool {
        self.from_table == self.to_table
    }

    /// Iterate `(from_column, to_column)` pairs.
    pub fn column_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.from_columns
            .iter()
            .map(String::as_str)
            .zip(self.to_columns.iter().map(String::as_str))
    }
}

/// Tables and foreign keys of one database, as captured by a schema fetcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    #[serde(default)]
    pub tables: Vec<Table>,

    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyEdge>,
}

impl SchemaSnapshot {
    pub fn new(tables: Vec<Table>, foreign_keys: Vec<ForeignKeyEdge>) -> Self {
        Self {
            tables,
            foreign_keys,
        }
    }

    /// Parse a snapshot from its JSON form.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Get a table by name.
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Table names in snapshot order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }
}
