// src/planning/cost_table.rs
// All-pairs cheapest-path costs over the pruned traversal graph, one Dijkstra
// per source. Only same-component pairs have entries.

use log::debug;
use std::collections::BTreeMap;

use super::dijkstra::{shortest_path_tree, ShortestPathTree};
use crate::graph::{EdgeWeight, Graph, GraphError, NodeId};

/// Cheapest-path distances and predecessor trees for every source node
#[derive(Debug, Clone, Default)]
pub struct CostTable {
    trees: BTreeMap<NodeId, ShortestPathTree>,
}

impl CostTable {
    /// Runs Dijkstra from every node of `graph`
    pub fn build(graph: &Graph, weight: &impl EdgeWeight) -> Result<Self, GraphError> {
        let mut trees = BTreeMap::new();
        for source in graph.node_ids() {
            trees.insert(source, shortest_path_tree(graph, source, weight)?);
        }

        let table = CostTable { trees };
        debug!(
            "Cost table built for {} sources, {} reachable pairs",
            table.trees.len(),
            table.pair_count()
        );
        Ok(table)
    }

    /// Cheapest distance from `from` to `to`.
    ///
    /// `None` when the nodes are in different components or are the same node.
    pub fn cost(&self, from: NodeId, to: NodeId) -> Option<f64> {
        if from == to {
            return None;
        }
        self.trees.get(&from)?.distances.get(&to).copied()
    }

    /// Costs from `from` to every other node of its component, in id order
    pub fn row(&self, from: NodeId) -> impl Iterator<Item = (NodeId, f64)> + '_ {
        self.trees
            .get(&from)
            .into_iter()
            .flat_map(|tree| tree.distances.iter())
            .filter(move |(to, _)| **to != from)
            .map(|(&to, &cost)| (to, cost))
    }

    /// Cheapest node path from `from` to `to`, both ends included
    pub fn path(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        let tree = self.trees.get(&from)?;
        if !tree.distances.contains_key(&to) {
            return None;
        }

        let mut path = vec![to];
        let mut current = to;
        while current != from {
            current = *tree.predecessors.get(&current)?;
            path.push(current);
        }
        path.reverse();
        Some(path)
    }

    /// Number of source rows
    pub fn source_count(&self) -> usize {
        self.trees.len()
    }

    /// Number of ordered (from, to) pairs with a cost, excluding self pairs
    pub fn pair_count(&self) -> usize {
        self.trees
            .values()
            .map(|tree| tree.distances.len().saturating_sub(1))
            .sum()
    }
}
