//! Traversal-path planning
//!
//! Turns the topological graph of a map's free space into the run's initial
//! pose and the pool of reachable goals:
//! - small components are pruned ([`pruner`])
//! - all-pairs cheapest costs are computed ([`cost_table`])
//! - a greedy tour covers the start node's component ([`tour`])
//! - tour nodes become oriented poses ([`poses`])

pub mod cost_table;
pub mod dijkstra;
pub mod poses;
pub mod pruner;
pub mod tour;

use log::info;
use rand::Rng;
use thiserror::Error;

use crate::graph::{EdgeWeight, Graph, GraphError, NodeId};

pub use cost_table::CostTable;
pub use poses::{GoalPool, OrientedPose, PoseSequence};
pub use pruner::prune_small_components;
pub use tour::{build_tour, choose_start, Tour};

/// Fatal planning failures. None of them is worth retrying within a run.
#[derive(Debug, Error)]
pub enum PlanningError {
    /// Fewer than two nodes left after pruning
    #[error(
        "insufficient number of nodes in the traversal graph ({remaining} after pruning), can not generate traversal path"
    )]
    InsufficientNodes {
        /// Nodes left after pruning
        remaining: usize,
    },
    /// The cost table disagrees with the component partition
    #[error("cost table row of node {node} reaches none of the {unvisited} unvisited nodes of its component")]
    TourInconsistency {
        /// Node whose row came up empty
        node: NodeId,
        /// Unvisited nodes left in the component
        unvisited: usize,
    },
    /// Requested start node is not in the pruned graph
    #[error("start node {0} is not in the traversal graph")]
    UnknownStart(NodeId),
    /// Invalid graph data (weights, node references)
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Result of planning, handed over to the run supervisor
#[derive(Debug, Clone)]
pub struct TraversalPlan {
    /// Node visiting order
    pub tour: Tour,
    /// Every pose in tour order, the initial pose included
    pub traversal_path: Vec<OrientedPose>,
    /// Pose installed as the robot's starting reference
    pub initial_pose: OrientedPose,
    /// Remaining poses, eligible as navigation goals
    pub goals: GoalPool,
}

/// Runs prune -> cost table -> tour -> poses with a configurable edge weight
#[derive(Debug, Clone)]
pub struct TraversalPlanner<W> {
    weight: W,
}

impl<W: EdgeWeight> TraversalPlanner<W> {
    /// Planner reading traversal distances through `weight`
    pub fn new(weight: W) -> Self {
        TraversalPlanner { weight }
    }

    /// Plans from a start node drawn uniformly among the pruned graph's nodes
    pub fn plan<R: Rng + ?Sized>(&self, graph: Graph, rng: &mut R) -> Result<TraversalPlan, PlanningError> {
        let graph = prune_small_components(graph)?;
        let costs = CostTable::build(&graph, &self.weight)?;
        let start = choose_start(&graph, rng).ok_or(PlanningError::InsufficientNodes { remaining: 0 })?;
        Self::sequence(&graph, &costs, start, rng)
    }

    /// Plans from a fixed start node
    pub fn plan_from<R: Rng + ?Sized>(
        &self,
        graph: Graph,
        start: NodeId,
        rng: &mut R,
    ) -> Result<TraversalPlan, PlanningError> {
        let graph = prune_small_components(graph)?;
        if !graph.contains(start) {
            return Err(PlanningError::UnknownStart(start));
        }
        let costs = CostTable::build(&graph, &self.weight)?;
        Self::sequence(&graph, &costs, start, rng)
    }

    fn sequence<R: Rng + ?Sized>(
        graph: &Graph,
        costs: &CostTable,
        start: NodeId,
        rng: &mut R,
    ) -> Result<TraversalPlan, PlanningError> {
        let tour = build_tour(graph, costs, start)?;
        info!(
            "Traversal tour from node {} covers {} nodes ({:.2} m)",
            start,
            tour.len(),
            tour.length(costs)
        );

        let sequence = PoseSequence::from_tour(&tour, graph, rng)?;
        let traversal_path = sequence.poses().to_vec();
        let (initial_pose, goals) = sequence
            .split_initial()
            .ok_or(PlanningError::InsufficientNodes { remaining: 0 })?;

        Ok(TraversalPlan {
            tour,
            traversal_path,
            initial_pose,
            goals,
        })
    }
}
