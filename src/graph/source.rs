// src/graph/source.rs
// Supplies traversal graphs to the planner. The clearance radius is applied here,
// upstream of pruning: locations too narrow for the robot never reach the planner.

use log::{debug, info};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::{Graph, GraphEdge, GraphError, NodeId};

/// Anything that can produce the traversal graph of a map
pub trait GraphSource {
    /// Graph restricted to locations with at least `minimum_radius` clearance
    fn traversal_graph(&self, minimum_radius: f64) -> Result<Graph, GraphError>;
}

/// Graph source backed by a YAML file.
///
/// ```yaml
/// nodes:
///   - { id: 0, vertex: [0.0, 0.0], radius: 0.8 }
///   - { id: 1, vertex: [1.5, 0.0] }
/// edges:
///   - { source: 0, target: 1, voronoi_path_distance: 1.5 }
/// ```
///
/// Nodes without a `radius` are assumed wide enough for any robot.
#[derive(Debug, Clone)]
pub struct YamlGraphSource {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct GraphFile {
    nodes: Vec<NodeEntry>,
    #[serde(default)]
    edges: Vec<EdgeEntry>,
}

#[derive(Debug, Deserialize)]
struct NodeEntry {
    id: NodeId,
    vertex: [f64; 2],
    #[serde(default)]
    radius: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct EdgeEntry {
    source: NodeId,
    target: NodeId,
    #[serde(flatten)]
    attributes: BTreeMap<String, f64>,
}

impl YamlGraphSource {
    /// Source reading `path` on every request
    pub fn new(path: impl AsRef<Path>) -> Self {
        YamlGraphSource {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses a YAML graph document and applies the clearance filter
    pub fn parse(document: &str, minimum_radius: f64) -> Result<Graph, GraphError> {
        let file: GraphFile = serde_yaml::from_str(document)?;
        build_graph(file, minimum_radius)
    }
}

impl GraphSource for YamlGraphSource {
    fn traversal_graph(&self, minimum_radius: f64) -> Result<Graph, GraphError> {
        info!("Loading traversal graph from {}", self.path.display());
        let document = std::fs::read_to_string(&self.path).map_err(|source| GraphError::Io {
            path: self.path.clone(),
            source,
        })?;
        Self::parse(&document, minimum_radius)
    }
}

/// An in-memory graph is its own source; clearance is assumed applied already
impl GraphSource for Graph {
    fn traversal_graph(&self, _minimum_radius: f64) -> Result<Graph, GraphError> {
        Ok(self.clone())
    }
}

fn build_graph(file: GraphFile, minimum_radius: f64) -> Result<Graph, GraphError> {
    let mut graph = Graph::new();
    let mut too_narrow = BTreeSet::new();

    for node in &file.nodes {
        if node.radius.is_some_and(|radius| radius < minimum_radius) {
            if !too_narrow.insert(node.id) || graph.contains(node.id) {
                return Err(GraphError::DuplicateNode(node.id));
            }
            continue;
        }
        if too_narrow.contains(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        graph.add_node(node.id, node.vertex[0], node.vertex[1])?;
    }

    for entry in file.edges {
        // edges touching a dropped location go with it
        if too_narrow.contains(&entry.source) || too_narrow.contains(&entry.target) {
            continue;
        }
        graph.add_edge(GraphEdge {
            source: entry.source,
            target: entry.target,
            attributes: entry.attributes,
        })?;
    }

    debug!(
        "Graph has {} nodes and {} edges ({} nodes below {:.3} m clearance dropped)",
        graph.node_count(),
        graph.edge_count(),
        too_narrow.len(),
        minimum_radius
    );

    Ok(graph)
}
