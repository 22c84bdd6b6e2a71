//! Topological traversal graph of a map's free space.
//!
//! Nodes are distinguishable locations with a 2D position, edges are feasible
//! direct paths between them. Edges carry a free map of named attributes; the
//! one used as traversal distance is selected through [`EdgeWeight`] so the
//! planning code never hard-codes an attribute name.

pub mod source;

use nalgebra::Point2;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::PathBuf;
use thiserror::Error;

pub use source::{GraphSource, YamlGraphSource};

/// Node identifier, unique within a graph
pub type NodeId = u64;

/// A location in the traversal graph
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    /// Unique identifier
    pub id: NodeId,
    /// Position in the map frame (meters)
    pub position: Point2<f64>,
}

/// Undirected edge with named numeric attributes
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    /// First endpoint
    pub source: NodeId,
    /// Second endpoint
    pub target: NodeId,
    /// Attribute name -> value (e.g. `voronoi_path_distance`)
    pub attributes: BTreeMap<String, f64>,
}

impl GraphEdge {
    /// Creates an edge without attributes
    pub fn new(source: NodeId, target: NodeId) -> Self {
        GraphEdge {
            source,
            target,
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_attribute(mut self, name: impl Into<String>, value: f64) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Looks up a named attribute
    pub fn attribute(&self, name: &str) -> Option<f64> {
        self.attributes.get(name).copied()
    }

    /// Endpoint opposite to `node`
    pub fn opposite(&self, node: NodeId) -> NodeId {
        if self.source == node {
            self.target
        } else {
            self.source
        }
    }
}

/// Accessor selecting the traversal distance of an edge.
///
/// Returning `None` means the edge does not carry a weight at all, which the
/// cost table builder reports as an error.
pub trait EdgeWeight {
    /// Weight of `edge`, if present
    fn weight(&self, edge: &GraphEdge) -> Option<f64>;
}

/// Reads the weight from a named edge attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedWeight(pub String);

impl NamedWeight {
    /// Weight read from the attribute called `name`
    pub fn new(name: impl Into<String>) -> Self {
        NamedWeight(name.into())
    }
}

impl EdgeWeight for NamedWeight {
    fn weight(&self, edge: &GraphEdge) -> Option<f64> {
        edge.attribute(&self.0)
    }
}

impl<F> EdgeWeight for F
where
    F: Fn(&GraphEdge) -> Option<f64>,
{
    fn weight(&self, edge: &GraphEdge) -> Option<f64> {
        self(edge)
    }
}

/// Graph construction and loading errors
#[derive(Debug, Error)]
pub enum GraphError {
    /// A node id was inserted twice
    #[error("duplicate node id {0}")]
    DuplicateNode(NodeId),
    /// An edge references a node that is not in the graph
    #[error("edge references unknown node {0}")]
    UnknownNode(NodeId),
    /// A node position is NaN or infinite
    #[error("node {0} has a non-finite position")]
    InvalidPosition(NodeId),
    /// The selected weight attribute is missing on an edge
    #[error("edge {from}-{to} has no traversal weight")]
    MissingWeight {
        /// First endpoint
        from: NodeId,
        /// Second endpoint
        to: NodeId,
    },
    /// The weight is negative, NaN or infinite
    #[error("edge {from}-{to} has invalid traversal weight {weight}")]
    InvalidWeight {
        /// First endpoint
        from: NodeId,
        /// Second endpoint
        to: NodeId,
        /// Offending value
        weight: f64,
    },
    /// Graph file could not be read
    #[error("could not read graph file {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// Graph file is not valid YAML for the expected layout
    #[error("could not parse graph file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Undirected graph with an adjacency map.
///
/// Iteration over nodes and neighbours is ordered by id, which keeps every
/// downstream algorithm reproducible for a fixed random source.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: BTreeMap<NodeId, GraphNode>,
    adjacency: BTreeMap<NodeId, BTreeMap<NodeId, GraphEdge>>,
}

impl Graph {
    /// Creates an empty graph
    pub fn new() -> Self {
        Graph::default()
    }

    /// Adds a node at `(x, y)`
    pub fn add_node(&mut self, id: NodeId, x: f64, y: f64) -> Result<(), GraphError> {
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        if !x.is_finite() || !y.is_finite() {
            return Err(GraphError::InvalidPosition(id));
        }

        self.nodes.insert(
            id,
            GraphNode {
                id,
                position: Point2::new(x, y),
            },
        );
        self.adjacency.insert(id, BTreeMap::new());
        Ok(())
    }

    /// Adds an undirected edge; a second edge between the same pair replaces the first
    pub fn add_edge(&mut self, edge: GraphEdge) -> Result<(), GraphError> {
        for endpoint in [edge.source, edge.target] {
            if !self.nodes.contains_key(&endpoint) {
                return Err(GraphError::UnknownNode(endpoint));
            }
        }

        if let Some(neighbours) = self.adjacency.get_mut(&edge.source) {
            neighbours.insert(edge.target, edge.clone());
        }
        if let Some(neighbours) = self.adjacency.get_mut(&edge.target) {
            neighbours.insert(edge.source, edge);
        }
        Ok(())
    }

    /// Removes a node and its incident edges. Returns false if it was absent.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        if self.nodes.remove(&id).is_none() {
            return false;
        }

        if let Some(neighbours) = self.adjacency.remove(&id) {
            for neighbour in neighbours.keys() {
                if let Some(back) = self.adjacency.get_mut(neighbour) {
                    back.remove(&id);
                }
            }
        }
        true
    }

    /// Removes every node in `ids`
    pub fn remove_nodes<'a>(&mut self, ids: impl IntoIterator<Item = &'a NodeId>) {
        for id in ids {
            self.remove_node(*id);
        }
    }

    /// Node lookup
    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    /// Whether `id` is in the graph
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.edges().count()
    }

    /// True if the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// Node ids in ascending order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Each undirected edge once
    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.adjacency.iter().flat_map(|(&node, neighbours)| {
            neighbours
                .iter()
                .filter(move |(other, _)| node <= **other)
                .map(|(_, edge)| edge)
        })
    }

    /// Neighbours of `id` with the connecting edge, in neighbour id order
    pub fn neighbours(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &GraphEdge)> {
        self.adjacency
            .get(&id)
            .into_iter()
            .flat_map(|neighbours| neighbours.iter().map(|(&other, edge)| (other, edge)))
    }

    /// All connected components, each a sorted id set, ordered by smallest member
    pub fn connected_components(&self) -> Vec<BTreeSet<NodeId>> {
        let mut seen = BTreeSet::new();
        let mut components = Vec::new();

        for &start in self.nodes.keys() {
            if seen.contains(&start) {
                continue;
            }
            let component = self.reachable_from(start);
            seen.extend(component.iter().copied());
            components.push(component);
        }

        components
    }

    /// The component containing `id`, or `None` if the node is absent
    pub fn component_of(&self, id: NodeId) -> Option<BTreeSet<NodeId>> {
        if !self.contains(id) {
            return None;
        }
        Some(self.reachable_from(id))
    }

    // Breadth-first flood fill
    fn reachable_from(&self, start: NodeId) -> BTreeSet<NodeId> {
        let mut component = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            for (neighbour, _) in self.neighbours(node) {
                if component.insert(neighbour) {
                    queue.push_back(neighbour);
                }
            }
        }

        component
    }
}
