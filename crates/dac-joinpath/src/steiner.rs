//! Join network for three or more tables.
//!
//! Finding the smallest set of joins that connects N tables is the Steiner
//! tree problem, which is NP-hard. This module uses the classic
//! minimum-spanning-tree approximation, which is within a factor of two of
//! the optimum under hop distance:
//!
//! 1. breadth-first search from every requested table;
//! 2. a complete graph over the requested tables weighted by hop count;
//! 3. a minimum spanning tree of that graph (Kruskal, ties broken by table
//!    names);
//! 4. the union of the real shortest paths behind each tree edge, with shared
//!    edges kept once;
//! 5. a depth-first walk from the lexicographically smallest requested table,
//!    which drops any cycle the union formed, followed by pruning of leaves
//!    that were not requested.

use std::collections::HashSet;

use crate::error::{JoinPathError, Result};
use crate::graph::{AdjacencyGraph, EdgeId, NodeId};
use crate::path::BfsTree;
use crate::steps::{JoinPath, Traversal, to_join_steps};

/// Approximate minimal join network connecting every table in `terminals`.
///
/// Requires at least three distinct tables; repeated names are ignored.
pub fn approximate_join_network(graph: &AdjacencyGraph, terminals: &[&str]) -> Result<JoinPath> {
    let mut distinct: Vec<&str> = Vec::with_capacity(terminals.len());
    for &name in terminals {
        if !distinct.contains(&name) {
            distinct.push(name);
        }
    }
    if distinct.len() < 3 {
        return Err(JoinPathError::InvalidRequest(format!(
            "a join network needs at least three distinct tables, got {}",
            distinct.len()
        )));
    }

    // Node ids follow name order, so sorting ids sorts terminals by name.
    let mut ids = graph.resolve(distinct.iter().copied())?;
    ids.sort_unstable();

    let trees: Vec<BfsTree> = ids
        .iter()
        .map(|&id| BfsTree::search(graph, id, None))
        .collect();

    let mut candidates = Vec::with_capacity(ids.len() * (ids.len() - 1) / 2);
    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            let hops = trees[i].distance(ids[j]).ok_or_else(|| {
                JoinPathError::no_path([graph.node_name(ids[i]), graph.node_name(ids[j])])
            })?;
            candidates.push((hops, i, j));
        }
    }
    candidates.sort_unstable();

    let mut components = DisjointSet::new(ids.len());
    let mut union: HashSet<EdgeId> = HashSet::new();
    let mut spanning_weight = 0;
    for (hops, i, j) in candidates {
        if !components.union(i, j) {
            continue;
        }
        spanning_weight += hops;
        if let Some(path) = trees[i].path_to(ids[j]) {
            union.extend(path.iter().map(|t| t.edge));
        }
    }

    let root = ids[0];
    let mut tree = depth_first_tree(graph, root, &union);
    prune_unrequested_leaves(graph.node_count(), &ids, &mut tree);

    tracing::debug!(
        tables = ids.len(),
        spanning_weight,
        joins = tree.len(),
        "Approximated join network"
    );

    Ok(to_join_steps(graph, root, &tree))
}

/// Preorder walk over the edges in `allowed`, visiting each node once.
fn depth_first_tree(graph: &AdjacencyGraph, root: NodeId, allowed: &HashSet<EdgeId>) -> Vec<Traversal> {
    let mut visited = vec![false; graph.node_count()];
    let mut out = Vec::new();
    let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];
    visited[root] = true;

    while let Some((node, mut cursor)) = stack.pop() {
        let neighbors = graph.neighbors(node);
        while cursor < neighbors.len() {
            let adjacent = neighbors[cursor];
            cursor += 1;
            if allowed.contains(&adjacent.edge) && !visited[adjacent.neighbor] {
                visited[adjacent.neighbor] = true;
                out.push(Traversal {
                    from: node,
                    to: adjacent.neighbor,
                    edge: adjacent.edge,
                });
                stack.push((node, cursor));
                stack.push((adjacent.neighbor, 0));
                break;
            }
        }
    }

    out
}

/// Remove leaves that are not requested tables until none remain.
///
/// Only leaf-side edges are removed, so the preorder of what remains is
/// still a valid join order.
fn prune_unrequested_leaves(node_count: usize, requested: &[NodeId], tree: &mut Vec<Traversal>) {
    let mut keep = vec![false; node_count];
    for &id in requested {
        keep[id] = true;
    }

    let mut degree = vec![0usize; node_count];
    let mut incident: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for (idx, t) in tree.iter().enumerate() {
        degree[t.from] += 1;
        degree[t.to] += 1;
        incident[t.from].push(idx);
        incident[t.to].push(idx);
    }

    let mut removed = vec![false; tree.len()];
    let mut leaves: Vec<NodeId> = (0..node_count)
        .filter(|&n| degree[n] == 1 && !keep[n])
        .collect();

    while let Some(leaf) = leaves.pop() {
        let Some(&idx) = incident[leaf].iter().find(|&&idx| !removed[idx]) else {
            continue;
        };
        removed[idx] = true;
        degree[leaf] -= 1;

        let t = tree[idx];
        let other = if t.from == leaf { t.to } else { t.from };
        degree[other] -= 1;
        if degree[other] == 1 && !keep[other] {
            leaves.push(other);
        }
    }

    let mut idx = 0;
    tree.retain(|_| {
        let kept = !removed[idx];
        idx += 1;
        kept
    });
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merge the sets of `a` and `b`; false if they were already joined.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        self.parent[ra.max(rb)] = ra.min(rb);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::JoinDirection;
    use dac_core::{ForeignKeyEdge, JoinGraphConfig, Table};
    use pretty_assertions::assert_eq;

    fn build(tables: &[Table], fks: &[ForeignKeyEdge]) -> AdjacencyGraph {
        AdjacencyGraph::build(tables, fks, &JoinGraphConfig::default()).unwrap()
    }

    fn shop() -> AdjacencyGraph {
        build(
            &[
                Table::new("customers", ["id"]),
                Table::new("orders", ["id", "customer_id"]),
                Table::new("order_items", ["id", "order_id", "product_id"]),
                Table::new("products", ["id", "supplier_id"]),
                Table::new("suppliers", ["id"]),
                Table::new("shipments", ["id", "order_id"]),
                Table::new("audit_log", ["id"]),
            ],
            &[
                ForeignKeyEdge::new("orders", ["customer_id"], "customers", ["id"]),
                ForeignKeyEdge::new("order_items", ["order_id"], "orders", ["id"]),
                ForeignKeyEdge::new("order_items", ["product_id"], "products", ["id"]),
                ForeignKeyEdge::new("products", ["supplier_id"], "suppliers", ["id"]),
                ForeignKeyEdge::new("shipments", ["order_id"], "orders", ["id"]),
            ],
        )
    }

    /// Every step must start from a table that is already joined.
    fn assert_is_tree(path: &JoinPath) {
        let tables = path.tables();
        let distinct: HashSet<_> = tables.iter().collect();
        assert_eq!(distinct.len(), tables.len(), "a table is joined twice");
        assert_eq!(path.len(), tables.len() - 1);

        let mut joined = vec![path.start_table.as_str()];
        for step in &path.steps {
            assert!(joined.contains(&step.from_table.as_str()), "{step:?}");
            assert_ne!(step.from_table, step.to_table);
            assert_eq!(step.from_columns.len(), step.to_columns.len());
            joined.push(&step.to_table);
        }
    }

    #[test]
    fn test_customers_order_items_products() {
        let path =
            approximate_join_network(&shop(), &["customers", "order_items", "products"]).unwrap();

        assert_eq!(
            path.tables(),
            vec!["customers", "orders", "order_items", "products"]
        );
        let directions: Vec<_> = path.steps.iter().map(|s| s.direction).collect();
        assert_eq!(
            directions,
            vec![
                JoinDirection::Reverse,
                JoinDirection::Reverse,
                JoinDirection::Forward
            ]
        );
        assert_eq!(path.steps[2].from_columns, vec!["product_id"]);
        assert_eq!(path.steps[2].to_columns, vec!["id"]);
        assert_is_tree(&path);
    }

    #[test]
    fn test_straight_chain_returns_the_chain() {
        let terminals = ["customers", "orders", "order_items", "products", "suppliers"];
        let path = approximate_join_network(&shop(), &terminals).unwrap();

        assert_eq!(path.len(), terminals.len() - 1);
        assert_eq!(
            path.tables(),
            vec!["customers", "orders", "order_items", "products", "suppliers"]
        );
    }

    #[test]
    fn test_shared_intermediate_is_joined_once() {
        let path =
            approximate_join_network(&shop(), &["shipments", "customers", "order_items"]).unwrap();

        // orders connects all three and appears exactly once.
        assert_eq!(path.len(), 3);
        assert_eq!(path.tables().iter().filter(|t| **t == "orders").count(), 1);
        assert_eq!(path.start_table, "customers");
        assert_is_tree(&path);
    }

    #[test]
    fn test_result_independent_of_request_order() {
        let graph = shop();
        let a = approximate_join_network(&graph, &["suppliers", "shipments", "customers"]).unwrap();
        let b = approximate_join_network(&graph, &["customers", "suppliers", "shipments"]).unwrap();
        assert_eq!(a, b);
        assert_is_tree(&a);
    }

    #[test]
    fn test_disconnected_terminal() {
        let err = approximate_join_network(&shop(), &["customers", "products", "audit_log"])
            .unwrap_err();
        assert!(matches!(err, JoinPathError::NoPathFound { .. }));
    }

    #[test]
    fn test_unknown_terminal() {
        let err = approximate_join_network(&shop(), &["customers", "products", "invoices"])
            .unwrap_err();
        assert!(matches!(err, JoinPathError::UnknownTable { .. }));
    }

    #[test]
    fn test_requires_three_distinct_tables() {
        let err =
            approximate_join_network(&shop(), &["customers", "orders", "customers"]).unwrap_err();
        assert!(matches!(err, JoinPathError::InvalidRequest(_)));
    }

    #[test]
    fn test_grid_corners_form_a_tree() {
        // 3x3 grid: each cell references its left and upper neighbor.
        let mut tables = Vec::new();
        let mut fks = Vec::new();
        for r in 0..3 {
            for c in 0..3 {
                let name = format!("cell_{r}{c}");
                tables.push(Table::new(&name, ["id", "left_id", "up_id"]));
                if c > 0 {
                    fks.push(ForeignKeyEdge::new(
                        &name,
                        ["left_id"],
                        format!("cell_{r}{}", c - 1),
                        ["id"],
                    ));
                }
                if r > 0 {
                    fks.push(ForeignKeyEdge::new(
                        &name,
                        ["up_id"],
                        format!("cell_{}{c}", r - 1),
                        ["id"],
                    ));
                }
            }
        }
        let graph = build(&tables, &fks);

        let corners = ["cell_00", "cell_02", "cell_20", "cell_22"];
        let path = approximate_join_network(&graph, &corners).unwrap();
        assert_is_tree(&path);
        for corner in corners {
            assert!(path.tables().contains(&corner));
        }
        // Any tree connecting opposite corners of a 3x3 grid needs at least 6 joins;
        // the approximation stays within twice that.
        assert!(path.len() >= 6 && path.len() <= 12, "{}", path.len());
    }

    #[test]
    fn test_equal_weight_pairs_break_ties_by_name() {
        // Every pair of terminals is two hops apart through its own link
        // table, so all three candidate pairs tie. The pairs involving
        // `artists` sort first and win; `bands_concerts` is never joined.
        let tables = [
            Table::new("artists", ["id"]),
            Table::new("bands", ["id"]),
            Table::new("concerts", ["id"]),
            Table::new("artists_bands", ["artist_id", "band_id"]),
            Table::new("artists_concerts", ["artist_id", "concert_id"]),
            Table::new("bands_concerts", ["band_id", "concert_id"]),
        ];
        let fks = [
            ForeignKeyEdge::new("artists_bands", ["artist_id"], "artists", ["id"]),
            ForeignKeyEdge::new("artists_bands", ["band_id"], "bands", ["id"]),
            ForeignKeyEdge::new("artists_concerts", ["artist_id"], "artists", ["id"]),
            ForeignKeyEdge::new("artists_concerts", ["concert_id"], "concerts", ["id"]),
            ForeignKeyEdge::new("bands_concerts", ["band_id"], "bands", ["id"]),
            ForeignKeyEdge::new("bands_concerts", ["concert_id"], "concerts", ["id"]),
        ];
        let graph = build(&tables, &fks);

        for request in [
            ["artists", "bands", "concerts"],
            ["concerts", "bands", "artists"],
        ] {
            let path = approximate_join_network(&graph, &request).unwrap();

            assert_eq!(
                path.tables(),
                vec!["artists", "artists_bands", "bands", "artists_concerts", "concerts"]
            );
            let steps: Vec<_> = path
                .steps
                .iter()
                .map(|s| (s.from_table.as_str(), s.to_table.as_str(), s.direction))
                .collect();
            assert_eq!(
                steps,
                vec![
                    ("artists", "artists_bands", JoinDirection::Reverse),
                    ("artists_bands", "bands", JoinDirection::Forward),
                    ("artists", "artists_concerts", JoinDirection::Reverse),
                    ("artists_concerts", "concerts", JoinDirection::Forward),
                ]
            );
            assert_eq!(path.steps[0].to_columns, vec!["artist_id"]);
            assert_eq!(path.steps[1].from_columns, vec!["band_id"]);
        }
    }

    #[test]
    fn test_prune_removes_dangling_intermediates() {
        let mut tree = vec![
            Traversal { from: 0, to: 1, edge: 0 },
            Traversal { from: 1, to: 2, edge: 1 },
            Traversal { from: 2, to: 3, edge: 2 },
            Traversal { from: 3, to: 4, edge: 3 },
        ];
        // Chain 0-1-2-3-4 with only 0 and 2 requested: 3 and 4 are a dangling tail.
        prune_unrequested_leaves(5, &[0, 2], &mut tree);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[1].to, 2);
    }
}
