// src/planning/pruner.rs
// Drops connected components too small to support a tour.

use log::{info, warn};

use super::PlanningError;
use crate::graph::Graph;

/// Components with fewer nodes than this are removed
pub const MIN_COMPONENT_SIZE: usize = 2;

/// Removes every component with fewer than [`MIN_COMPONENT_SIZE`] nodes.
///
/// Fails with [`PlanningError::InsufficientNodes`] when fewer than
/// [`MIN_COMPONENT_SIZE`] nodes survive. The map decides this, so there is
/// nothing to retry.
pub fn prune_small_components(mut graph: Graph) -> Result<Graph, PlanningError> {
    let too_small: Vec<_> = graph
        .connected_components()
        .into_iter()
        .filter(|component| component.len() < MIN_COMPONENT_SIZE)
        .collect();

    if !too_small.is_empty() {
        let removed: usize = too_small.iter().map(|component| component.len()).sum();
        warn!(
            "Removing {} graph component(s) smaller than {} nodes ({} nodes)",
            too_small.len(),
            MIN_COMPONENT_SIZE,
            removed
        );
        for component in &too_small {
            graph.remove_nodes(component);
        }
    }

    if graph.node_count() < MIN_COMPONENT_SIZE {
        return Err(PlanningError::InsufficientNodes {
            remaining: graph.node_count(),
        });
    }

    info!(
        "Pruned graph: {} nodes, {} edges",
        graph.node_count(),
        graph.edge_count()
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphEdge;

    #[test]
    fn test_isolated_nodes_only_is_insufficient() {
        let mut graph = Graph::new();
        for id in 0..3 {
            graph.add_node(id, 0.0, 0.0).unwrap();
        }

        let result = prune_small_components(graph);
        assert!(matches!(result, Err(PlanningError::InsufficientNodes { remaining: 0 })));
    }

    #[test]
    fn test_single_pair_survives() {
        let mut graph = Graph::new();
        graph.add_node(0, 0.0, 0.0).unwrap();
        graph.add_node(1, 1.0, 0.0).unwrap();
        graph.add_node(2, 5.0, 5.0).unwrap();
        graph.add_edge(GraphEdge::new(0, 1).with_attribute("d", 1.0)).unwrap();

        let pruned = prune_small_components(graph).unwrap();
        assert_eq!(pruned.node_ids().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_empty_graph_is_insufficient() {
        assert!(prune_small_components(Graph::new()).is_err());
    }
}
