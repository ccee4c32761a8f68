//! Shortest join path between two tables.
//!
//! Every foreign key counts as one hop. Breadth-first search expands
//! neighbors in graph order, so among equally short paths the one through
//! the lexicographically earliest tables is found first.

use std::collections::VecDeque;

use crate::error::{JoinPathError, Result};
use crate::graph::{AdjacencyGraph, EdgeId, NodeId};
use crate::steps::{JoinPath, Traversal, to_join_steps};

/// Breadth-first search tree rooted at one node.
pub(crate) struct BfsTree {
    source: NodeId,
    /// `(parent, edge)` through which each node was first reached.
    parent: Vec<Option<(NodeId, EdgeId)>>,
    distance: Vec<Option<usize>>,
}

impl BfsTree {
    /// Search from `source`, stopping once `target` is dequeued (if given).
    pub(crate) fn search(graph: &AdjacencyGraph, source: NodeId, target: Option<NodeId>) -> Self {
        let n = graph.node_count();
        let mut parent = vec![None; n];
        let mut distance = vec![None; n];
        let mut queue = VecDeque::new();

        distance[source] = Some(0);
        queue.push_back(source);

        while let Some(node) = queue.pop_front() {
            if Some(node) == target {
                break;
            }
            let next = distance[node].map_or(0, |d| d + 1);
            for adjacent in graph.neighbors(node) {
                if distance[adjacent.neighbor].is_none() {
                    distance[adjacent.neighbor] = Some(next);
                    parent[adjacent.neighbor] = Some((node, adjacent.edge));
                    queue.push_back(adjacent.neighbor);
                }
            }
        }

        Self {
            source,
            parent,
            distance,
        }
    }

    /// Hop count from the source, if reached.
    pub(crate) fn distance(&self, node: NodeId) -> Option<usize> {
        self.distance[node]
    }

    /// Edges from the source to `target`, in traversal order.
    pub(crate) fn path_to(&self, target: NodeId) -> Option<Vec<Traversal>> {
        self.distance[target]?;

        let mut path = Vec::new();
        let mut current = target;
        while current != self.source {
            let (parent, edge) = self.parent[current]?;
            path.push(Traversal {
                from: parent,
                to: current,
                edge,
            });
            current = parent;
        }
        path.reverse();
        Some(path)
    }
}

/// Shortest join path from `from_table` to `to_table`.
///
/// Asking for the path from a table to itself yields an empty path.
pub fn shortest_path(graph: &AdjacencyGraph, from_table: &str, to_table: &str) -> Result<JoinPath> {
    let ids = graph.resolve([from_table, to_table])?;
    let (source, target) = (ids[0], ids[1]);

    if source == target {
        return Ok(to_join_steps(graph, source, &[]));
    }

    let tree = BfsTree::search(graph, source, Some(target));
    let traversal = tree
        .path_to(target)
        .ok_or_else(|| JoinPathError::no_path([from_table, to_table]))?;

    tracing::debug!(
        from = %from_table,
        to = %to_table,
        hops = traversal.len(),
        "Found shortest join path"
    );

    Ok(to_join_steps(graph, source, &traversal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::JoinDirection;
    use dac_core::{ForeignKeyEdge, JoinGraphConfig, Table};
    use pretty_assertions::assert_eq;

    fn shop() -> AdjacencyGraph {
        AdjacencyGraph::build(
            &[
                Table::new("customers", ["id"]),
                Table::new("orders", ["id", "customer_id"]),
                Table::new("order_items", ["id", "order_id", "product_id"]),
                Table::new("products", ["id"]),
                Table::new("employees", ["id", "manager_id"]),
                Table::new("audit_log", ["id"]),
            ],
            &[
                ForeignKeyEdge::new("orders", ["customer_id"], "customers", ["id"]),
                ForeignKeyEdge::new("order_items", ["order_id"], "orders", ["id"]),
                ForeignKeyEdge::new("order_items", ["product_id"], "products", ["id"]),
                ForeignKeyEdge::new("employees", ["manager_id"], "employees", ["id"]),
            ],
            &JoinGraphConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_customers_to_order_items() {
        let path = shortest_path(&shop(), "customers", "order_items").unwrap();

        assert_eq!(path.start_table, "customers");
        assert_eq!(path.tables(), vec!["customers", "orders", "order_items"]);

        let first = &path.steps[0];
        assert_eq!(first.direction, JoinDirection::Reverse);
        assert_eq!(first.from_columns, vec!["id"]);
        assert_eq!(first.to_columns, vec!["customer_id"]);

        let second = &path.steps[1];
        assert_eq!(second.direction, JoinDirection::Reverse);
        assert_eq!(second.from_table, "orders");
        assert_eq!(second.from_columns, vec!["id"]);
        assert_eq!(second.to_columns, vec!["order_id"]);
    }

    #[test]
    fn test_forward_direction_toward_parent() {
        let path = shortest_path(&shop(), "order_items", "customers").unwrap();
        assert_eq!(path.len(), 2);
        assert!(path.steps.iter().all(|s| s.direction == JoinDirection::Forward));
        assert_eq!(path.steps[0].from_columns, vec!["order_id"]);
    }

    #[test]
    fn test_path_length_is_symmetric() {
        let graph = shop();
        let connected = ["customers", "orders", "order_items", "products"];
        for a in connected {
            for b in connected {
                let forward = shortest_path(&graph, a, b).unwrap();
                let backward = shortest_path(&graph, b, a).unwrap();
                assert_eq!(forward.len(), backward.len(), "{a} <-> {b}");
            }
        }
    }

    #[test]
    fn test_same_table_is_empty_path() {
        let path = shortest_path(&shop(), "orders", "orders").unwrap();
        assert!(path.is_empty());
        assert_eq!(path.start_table, "orders");
    }

    #[test]
    fn test_disconnected_tables() {
        let err = shortest_path(&shop(), "orders", "audit_log").unwrap_err();
        assert!(matches!(err, JoinPathError::NoPathFound { .. }));
        assert_eq!(err.to_string(), "no join path connects: orders, audit_log");
    }

    #[test]
    fn test_self_reference_is_not_a_path() {
        let err = shortest_path(&shop(), "employees", "customers").unwrap_err();
        assert!(matches!(err, JoinPathError::NoPathFound { .. }));
    }

    #[test]
    fn test_unknown_table() {
        let err = shortest_path(&shop(), "orders", "invoices").unwrap_err();
        assert!(matches!(err, JoinPathError::UnknownTable { .. }));
        assert!(err.to_string().starts_with("unknown tables: invoices. Available tables:"));
    }

    #[test]
    fn test_tie_break_prefers_earliest_intermediate() {
        // Two equally short routes from region to shipment: via a_depot or b_depot.
        let tables = [
            Table::new("region", ["id"]),
            Table::new("b_depot", ["id", "region_id"]),
            Table::new("a_depot", ["id", "region_id"]),
            Table::new("shipment", ["id", "a_depot_id", "b_depot_id"]),
        ];
        let fks = [
            ForeignKeyEdge::new("b_depot", ["region_id"], "region", ["id"]),
            ForeignKeyEdge::new("a_depot", ["region_id"], "region", ["id"]),
            ForeignKeyEdge::new("shipment", ["b_depot_id"], "b_depot", ["id"]),
            ForeignKeyEdge::new("shipment", ["a_depot_id"], "a_depot", ["id"]),
        ];
        let graph = AdjacencyGraph::build(&tables, &fks, &JoinGraphConfig::default()).unwrap();

        let path = shortest_path(&graph, "region", "shipment").unwrap();
        assert_eq!(path.tables(), vec!["region", "a_depot", "shipment"]);

        let back = shortest_path(&graph, "shipment", "region").unwrap();
        assert_eq!(back.tables(), vec!["shipment", "a_depot", "region"]);
    }

    #[test]
    fn test_parallel_foreign_keys_pick_first_by_columns() {
        let tables = [
            Table::new("addresses", ["id"]),
            Table::new("orders", ["id", "shipping_address_id", "billing_address_id"]),
        ];
        let fks = [
            ForeignKeyEdge::new("orders", ["shipping_address_id"], "addresses", ["id"]),
            ForeignKeyEdge::new("orders", ["billing_address_id"], "addresses", ["id"]),
        ];
        let graph = AdjacencyGraph::build(&tables, &fks, &JoinGraphConfig::default()).unwrap();

        let path = shortest_path(&graph, "orders", "addresses").unwrap();
        assert_eq!(path.steps[0].from_columns, vec!["billing_address_id"]);
    }
}
