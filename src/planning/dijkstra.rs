//! Single-source Dijkstra over the traversal graph.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use crate::graph::{EdgeWeight, Graph, GraphEdge, GraphError, NodeId};

/// Priority queue entry
#[derive(Clone, Copy, Debug)]
struct QueueEntry {
    cost: f64,
    node: NodeId,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.node == other.node
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; equal costs pop the smaller id first
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Distances and predecessor tree from one source
#[derive(Clone, Debug, Default)]
pub struct ShortestPathTree {
    /// Cheapest distance to every reachable node, the source included (0.0)
    pub distances: BTreeMap<NodeId, f64>,
    /// Predecessor of every reachable node except the source
    pub predecessors: BTreeMap<NodeId, NodeId>,
}

/// Weight of `edge`, rejected unless finite and non-negative
pub(crate) fn checked_weight(weight: &impl EdgeWeight, edge: &GraphEdge) -> Result<f64, GraphError> {
    let value = weight.weight(edge).ok_or(GraphError::MissingWeight {
        from: edge.source,
        to: edge.target,
    })?;

    if !value.is_finite() || value < 0.0 {
        return Err(GraphError::InvalidWeight {
            from: edge.source,
            to: edge.target,
            weight: value,
        });
    }
    Ok(value)
}

/// Runs Dijkstra from `source` until every reachable node is settled.
///
/// Fails on the first edge whose weight is missing, negative or not finite.
pub fn shortest_path_tree(
    graph: &Graph,
    source: NodeId,
    weight: &impl EdgeWeight,
) -> Result<ShortestPathTree, GraphError> {
    let mut tree = ShortestPathTree::default();
    if !graph.contains(source) {
        return Err(GraphError::UnknownNode(source));
    }

    tree.distances.insert(source, 0.0);
    let mut heap = BinaryHeap::new();
    heap.push(QueueEntry {
        cost: 0.0,
        node: source,
    });

    while let Some(QueueEntry { cost, node }) = heap.pop() {
        // Stale entry, a cheaper route was already settled
        if tree.distances.get(&node).is_some_and(|&best| cost > best) {
            continue;
        }

        for (neighbour, edge) in graph.neighbours(node) {
            let candidate = cost + checked_weight(weight, edge)?;
            let improves = tree
                .distances
                .get(&neighbour)
                .is_none_or(|&known| candidate < known);

            if improves {
                tree.distances.insert(neighbour, candidate);
                tree.predecessors.insert(neighbour, node);
                heap.push(QueueEntry {
                    cost: candidate,
                    node: neighbour,
                });
            }
        }
    }

    Ok(tree)
}
