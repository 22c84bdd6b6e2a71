// src/planning/tour.rs
// Greedy nearest-unvisited-node tour over one connected component.

use log::debug;
use rand::seq::IteratorRandom;
use rand::Rng;

use super::cost_table::CostTable;
use super::PlanningError;
use crate::graph::{Graph, NodeId};

/// Visiting order over every node of one component, each exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tour {
    nodes: Vec<NodeId>,
}

impl Tour {
    /// Node ids in visiting order
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Number of nodes in the tour
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True for an empty tour (never produced by [`build_tour`])
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node the tour starts from
    pub fn start(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    /// Sum of the cheapest-path costs between consecutive nodes
    pub fn length(&self, costs: &CostTable) -> f64 {
        self.nodes
            .windows(2)
            .filter_map(|pair| costs.cost(pair[0], pair[1]))
            .sum()
    }
}

/// Picks the start node uniformly among all nodes of `graph`
pub fn choose_start<R: Rng + ?Sized>(graph: &Graph, rng: &mut R) -> Option<NodeId> {
    graph.node_ids().choose(rng)
}

/// Builds the greedy tour of `start`'s component.
///
/// From the current node, the cheapest unvisited node in its cost row is
/// visited next; on equal costs the first one in row order wins. A row with
/// no unvisited entry while the component still has unvisited nodes means the
/// partition and the cost table disagree, reported as
/// [`PlanningError::TourInconsistency`].
pub fn build_tour(graph: &Graph, costs: &CostTable, start: NodeId) -> Result<Tour, PlanningError> {
    let mut unvisited = graph
        .component_of(start)
        .ok_or(PlanningError::UnknownStart(start))?;
    unvisited.remove(&start);

    let mut nodes = Vec::with_capacity(unvisited.len() + 1);
    nodes.push(start);
    let mut current = start;

    while !unvisited.is_empty() {
        let mut nearest: Option<(NodeId, f64)> = None;
        for (candidate, cost) in costs.row(current) {
            if !unvisited.contains(&candidate) {
                continue;
            }
            if nearest.is_none_or(|(_, best)| cost < best) {
                nearest = Some((candidate, cost));
            }
        }

        let (next, cost) = nearest.ok_or(PlanningError::TourInconsistency {
            node: current,
            unvisited: unvisited.len(),
        })?;
        debug!("Tour step {} -> {} ({:.3})", current, next, cost);

        unvisited.remove(&next);
        nodes.push(next);
        current = next;
    }

    Ok(Tour { nodes })
}
