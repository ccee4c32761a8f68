//! Foreign-key graph construction.
//!
//! The graph is stored in a compressed sparse row layout: one flat array of
//! `(neighbor, edge)` entries, sliced per node by an offsets array. Each edge
//! appears once under each endpoint so that a join can be planned from either
//! side. A self-referencing foreign key appears once, under its own table,
//! after the node's traversable range, so searches never see it.
//!
//! Iteration order is fully deterministic: nodes are sorted by name and each
//! node's entries by neighbor name, then by the edge's column lists.

use std::collections::{HashMap, HashSet};

use dac_core::{ForeignKeyEdge, JoinGraphConfig, Table};

use crate::error::{JoinPathError, Result};

/// Index of a table in [`AdjacencyGraph::nodes`].
pub type NodeId = usize;

/// Index of a foreign key in [`AdjacencyGraph::edges`].
pub type EdgeId = usize;

/// One adjacency entry: the table on the other side of `edge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjacent {
    pub neighbor: NodeId,
    pub edge: EdgeId,
}

/// Immutable foreign-key graph for one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjacencyGraph {
    nodes: Vec<String>,
    index: HashMap<String, NodeId>,
    edges: Vec<ForeignKeyEdge>,
    /// `(child, parent)` node ids per edge.
    endpoints: Vec<(NodeId, NodeId)>,
    /// `entries[offsets[n]..offsets[n + 1]]` is every entry of node `n`.
    offsets: Vec<usize>,
    /// `entries[offsets[n]..traversable_end[n]]` excludes self references.
    traversable_end: Vec<usize>,
    entries: Vec<Adjacent>,
}

impl AdjacencyGraph {
    /// Build the graph for one database.
    ///
    /// Fails with [`JoinPathError::MalformedSchema`] when a foreign key names
    /// a table or column that is not in `tables`, and with
    /// [`JoinPathError::GraphTooLarge`] when the input exceeds `limits`.
    pub fn build(
        tables: &[Table],
        foreign_keys: &[ForeignKeyEdge],
        limits: &JoinGraphConfig,
    ) -> Result<Self> {
        let sorted_tables = check_schema(tables, foreign_keys, limits)?;

        let nodes: Vec<String> = sorted_tables.iter().map(|t| t.name.clone()).collect();
        let index: HashMap<String, NodeId> = nodes
            .iter()
            .enumerate()
            .map(|(id, name)| (name.clone(), id))
            .collect();

        let mut edges: Vec<ForeignKeyEdge> = foreign_keys.to_vec();
        edges.sort_by(|a, b| edge_sort_key(a).cmp(&edge_sort_key(b)));
        let before = edges.len();
        edges.dedup();
        if edges.len() != before {
            tracing::debug!(
                duplicates = before - edges.len(),
                "Dropped duplicate foreign key definitions"
            );
        }

        let endpoints: Vec<(NodeId, NodeId)> = edges
            .iter()
            .map(|fk| (index[&fk.from_table], index[&fk.to_table]))
            .collect();

        let mut traversable: Vec<Vec<Adjacent>> = vec![Vec::new(); nodes.len()];
        let mut self_loops: Vec<Vec<Adjacent>> = vec![Vec::new(); nodes.len()];
        for (edge, &(child, parent)) in endpoints.iter().enumerate() {
            if child == parent {
                self_loops[child].push(Adjacent {
                    neighbor: child,
                    edge,
                });
            } else {
                traversable[child].push(Adjacent {
                    neighbor: parent,
                    edge,
                });
                traversable[parent].push(Adjacent {
                    neighbor: child,
                    edge,
                });
            }
        }

        // Node ids follow name order, so sorting by id sorts by neighbor name.
        for list in &mut traversable {
            list.sort_by(|a, b| {
                a.neighbor.cmp(&b.neighbor).then_with(|| {
                    let (ea, eb) = (&edges[a.edge], &edges[b.edge]);
                    (&ea.from_columns, &ea.to_columns, &ea.name, a.edge).cmp(&(
                        &eb.from_columns,
                        &eb.to_columns,
                        &eb.name,
                        b.edge,
                    ))
                })
            });
        }

        let mut offsets = Vec::with_capacity(nodes.len() + 1);
        let mut traversable_end = Vec::with_capacity(nodes.len());
        let mut entries = Vec::with_capacity(edges.len() * 2);
        for (list, loops) in traversable.into_iter().zip(self_loops) {
            offsets.push(entries.len());
            entries.extend(list);
            traversable_end.push(entries.len());
            entries.extend(loops);
        }
        offsets.push(entries.len());

        tracing::debug!(
            tables = nodes.len(),
            foreign_keys = edges.len(),
            "Built foreign key graph"
        );

        Ok(Self {
            nodes,
            index,
            edges,
            endpoints,
            offsets,
            traversable_end,
            entries,
        })
    }

    /// Run every check [`AdjacencyGraph::build`] performs without building.
    ///
    /// Cheap enough to run on each request, so a cached graph is never
    /// returned for input that a fresh build would reject.
    pub fn validate(
        tables: &[Table],
        foreign_keys: &[ForeignKeyEdge],
        limits: &JoinGraphConfig,
    ) -> Result<()> {
        check_schema(tables, foreign_keys, limits).map(|_| ())
    }

    /// Table names in node order (sorted).
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Foreign keys in edge order.
    pub fn edges(&self) -> &[ForeignKeyEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Look up a table's node id.
    pub fn node_id(&self, table: &str) -> Option<NodeId> {
        self.index.get(table).copied()
    }

    pub fn contains(&self, table: &str) -> bool {
        self.index.contains_key(table)
    }

    /// Table name of a node.
    pub fn node_name(&self, node: NodeId) -> &str {
        &self.nodes[node]
    }

    pub fn edge(&self, edge: EdgeId) -> &ForeignKeyEdge {
        &self.edges[edge]
    }

    /// `(child, parent)` node ids of an edge.
    pub fn endpoints(&self, edge: EdgeId) -> (NodeId, NodeId) {
        self.endpoints[edge]
    }

    /// Entries usable for path search. Self references are never included.
    pub fn neighbors(&self, node: NodeId) -> &[Adjacent] {
        &self.entries[self.offsets[node]..self.traversable_end[node]]
    }

    /// Every entry of a node, self references last.
    pub fn adjacency(&self, node: NodeId) -> &[Adjacent] {
        &self.entries[self.offsets[node]..self.offsets[node + 1]]
    }

    /// Foreign keys whose table references itself.
    pub fn self_references(&self) -> impl Iterator<Item = &ForeignKeyEdge> {
        self.endpoints
            .iter()
            .zip(&self.edges)
            .filter(|((child, parent), _)| child == parent)
            .map(|(_, fk)| fk)
    }

    /// Names of the requested tables that are not in the graph.
    pub(crate) fn missing<'a, I>(&self, tables: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        tables
            .into_iter()
            .filter(|t| !self.contains(t))
            .map(str::to_string)
            .collect()
    }

    /// Resolve table names to node ids, reporting every unknown name at once.
    pub(crate) fn resolve<'a, I>(&self, tables: I) -> Result<Vec<NodeId>>
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        let missing = self.missing(tables.clone());
        if !missing.is_empty() {
            return Err(JoinPathError::UnknownTable {
                missing,
                available: self.nodes.clone(),
            });
        }
        Ok(tables.into_iter().map(|t| self.index[t]).collect())
    }
}

fn edge_sort_key(fk: &ForeignKeyEdge) -> (&str, &str, &[String], &[String], Option<&str>) {
    (
        fk.from_table.as_str(),
        fk.to_table.as_str(),
        fk.from_columns.as_slice(),
        fk.to_columns.as_slice(),
        fk.name.as_deref(),
    )
}

/// Size caps, duplicate tables and foreign-key references. Returns the
/// tables sorted by name, which is node order.
fn check_schema<'a>(
    tables: &'a [Table],
    foreign_keys: &[ForeignKeyEdge],
    limits: &JoinGraphConfig,
) -> Result<Vec<&'a Table>> {
    if tables.len() > limits.max_tables {
        return Err(JoinPathError::GraphTooLarge {
            what: "table",
            count: tables.len(),
            limit: limits.max_tables,
        });
    }
    if foreign_keys.len() > limits.max_foreign_keys {
        return Err(JoinPathError::GraphTooLarge {
            what: "foreign key",
            count: foreign_keys.len(),
            limit: limits.max_foreign_keys,
        });
    }

    let mut sorted_tables: Vec<&Table> = tables.iter().collect();
    sorted_tables.sort_by(|a, b| a.name.cmp(&b.name));
    if let Some(pair) = sorted_tables.windows(2).find(|w| w[0].name == w[1].name) {
        return Err(JoinPathError::malformed(format!(
            "table '{}' is listed more than once",
            pair[0].name
        )));
    }

    let index: HashMap<&str, NodeId> = sorted_tables
        .iter()
        .enumerate()
        .map(|(id, t)| (t.name.as_str(), id))
        .collect();
    for fk in foreign_keys {
        validate_foreign_key(fk, &sorted_tables, &index)?;
    }

    Ok(sorted_tables)
}

fn describe(fk: &ForeignKeyEdge) -> String {
    match &fk.name {
        Some(name) => format!("foreign key '{}' ({} -> {})", name, fk.from_table, fk.to_table),
        None => format!("foreign key {} -> {}", fk.from_table, fk.to_table),
    }
}

fn validate_foreign_key(
    fk: &ForeignKeyEdge,
    tables: &[&Table],
    index: &HashMap<&str, NodeId>,
) -> Result<()> {
    let lookup = |name: &str| index.get(name).map(|&id| tables[id]);

    let from = lookup(fk.from_table.as_str()).ok_or_else(|| {
        JoinPathError::malformed(format!(
            "{} references unknown table '{}'",
            describe(fk),
            fk.from_table
        ))
    })?;
    let to = lookup(fk.to_table.as_str()).ok_or_else(|| {
        JoinPathError::malformed(format!(
            "{} references unknown table '{}'",
            describe(fk),
            fk.to_table
        ))
    })?;

    if fk.from_columns.is_empty() || fk.from_columns.len() != fk.to_columns.len() {
        return Err(JoinPathError::malformed(format!(
            "{} maps {} column(s) onto {}",
            describe(fk),
            fk.from_columns.len(),
            fk.to_columns.len()
        )));
    }

    let mut seen = HashSet::new();
    for column in &fk.from_columns {
        if !seen.insert(column) {
            return Err(JoinPathError::malformed(format!(
                "{} lists column '{}' twice",
                describe(fk),
                column
            )));
        }
    }

    for (table, columns) in [(from, &fk.from_columns), (to, &fk.to_columns)] {
        if let Some(column) = columns.iter().find(|c| !table.has_column(c)) {
            return Err(JoinPathError::malformed(format!(
                "{} references unknown column '{}.{}'",
                describe(fk),
                table.name,
                column
            )));
        }
    }

    Ok(())
}
