//! Join steps and their SQL rendering.

use serde::{Deserialize, Serialize};

use crate::graph::{AdjacencyGraph, EdgeId, NodeId};

/// Whether a step follows the foreign key from child to parent (`Forward`)
/// or walks it from parent to child (`Reverse`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinDirection {
    Forward,
    Reverse,
}

/// One join: `to_table` is joined onto the already-joined `from_table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinStep {
    pub from_table: String,
    pub to_table: String,
    /// Columns of `from_table`, positionally matched with `to_columns`.
    pub from_columns: Vec<String>,
    pub to_columns: Vec<String>,
    pub direction: JoinDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_name: Option<String>,
}

impl JoinStep {
    /// Iterate `(from_column, to_column)` equality pairs.
    pub fn column_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.from_columns
            .iter()
            .map(String::as_str)
            .zip(self.to_columns.iter().map(String::as_str))
    }
}

/// An ordered join plan starting from `start_table`.
///
/// Every step's `from_table` is either the start table or the `to_table` of
/// an earlier step, so the steps can be emitted as consecutive `JOIN`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPath {
    pub start_table: String,
    pub steps: Vec<JoinStep>,
}

impl JoinPath {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Every table the plan touches, in join order.
    pub fn tables(&self) -> Vec<&str> {
        std::iter::once(self.start_table.as_str())
            .chain(self.steps.iter().map(|s| s.to_table.as_str()))
            .collect()
    }

    /// Render a `FROM ... JOIN ... ON ...` clause.
    ///
    /// The join type is left as a plain `JOIN`; callers choose between inner
    /// and outer joins for their query.
    pub fn to_sql(&self) -> String {
        let mut sql = format!("FROM {}", quote_ident(&self.start_table));
        for step in &self.steps {
            let from = quote_ident(&step.from_table);
            let to = quote_ident(&step.to_table);
            let on = step
                .column_pairs()
                .map(|(l, r)| format!("{}.{} = {}.{}", from, quote_part(l), to, quote_part(r)))
                .collect::<Vec<_>>()
                .join(" AND ");
            sql.push_str(&format!("\nJOIN {} ON {}", to, on));
        }
        sql
    }
}

/// One traversed edge of a path or tree, in traversal orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Traversal {
    pub from: NodeId,
    pub to: NodeId,
    pub edge: EdgeId,
}

/// Turn traversed edges into join steps.
///
/// The direction of each step is derived by comparing the traversal with the
/// foreign key's child-to-parent orientation; reverse steps get their column
/// lists swapped so that `from_columns` always belong to `from_table`.
pub fn to_join_steps(graph: &AdjacencyGraph, start: NodeId, traversal: &[Traversal]) -> JoinPath {
    let steps = traversal
        .iter()
        .map(|t| {
            let fk = graph.edge(t.edge);
            let (child, parent) = graph.endpoints(t.edge);
            debug_assert_ne!(t.from, t.to, "self references are never traversed");
            debug_assert!(
                (t.from, t.to) == (child, parent) || (t.from, t.to) == (parent, child),
                "traversal does not match its edge"
            );

            let (direction, from_columns, to_columns) = if t.from == child {
                (JoinDirection::Forward, &fk.from_columns, &fk.to_columns)
            } else {
                (JoinDirection::Reverse, &fk.to_columns, &fk.from_columns)
            };

            JoinStep {
                from_table: graph.node_name(t.from).to_string(),
                to_table: graph.node_name(t.to).to_string(),
                from_columns: from_columns.clone(),
                to_columns: to_columns.clone(),
                direction,
                constraint_name: fk.name.clone(),
            }
        })
        .collect();

    JoinPath {
        start_table: graph.node_name(start).to_string(),
        steps,
    }
}

fn quote_part(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

// Schema-qualified names are quoted per part: public.orders -> "public"."orders".
fn quote_ident(name: &str) -> String {
    name.split('.').map(quote_part).collect::<Vec<_>>().join(".")
}
