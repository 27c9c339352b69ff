// Sector Ripple - Dependency Graph
// mod.rs - Module exports and the Graph container
//
// The graph is supplied by an external loader (the dashboard's graph JSON)
// and stays read-only for the lifetime of a simulation run.
//
// Copyright (c) 2026 Sector Ripple contributors. All rights reserved.

pub mod edges;
pub mod nodes;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use edges::{edge_key, Adjacency, Edge, Outgoing};
pub use nodes::Node;

use crate::{RippleError, RippleResult};

/// How the engine treats edges whose endpoints are not in the node list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DanglingEdgePolicy {
    /// Skip the edge (it simply never fires).
    #[default]
    Ignore,
    /// Fail engine construction with [`RippleError::DanglingEdge`].
    Reject,
}

/// Sectors and their directed dependency edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// Parse the dashboard's graph JSON (`{"nodes": [...], "edges": [...]}`).
    pub fn from_json_str(json: &str) -> RippleResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a graph JSON file.
    pub fn load(path: &Path) -> RippleResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let graph = Self::from_json_str(&json)?;
        log::info!(
            "Loaded graph from {} ({} nodes, {} edges)",
            path.display(),
            graph.nodes.len(),
            graph.edges.len(),
        );
        Ok(graph)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Baseline score per node id.
    pub fn baselines(&self) -> BTreeMap<String, f64> {
        self.nodes
            .iter()
            .map(|n| (n.id.clone(), n.base_score))
            .collect()
    }

    /// Edges with at least one endpoint missing from the node list.
    pub fn dangling_edges(&self) -> Vec<&Edge> {
        let known: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        self.edges
            .iter()
            .filter(|e| !known.contains(e.source.as_str()) || !known.contains(e.target.as_str()))
            .collect()
    }

    /// Strict structural check: unique node ids and no dangling edges.
    ///
    /// The engine does not require this under [`DanglingEdgePolicy::Ignore`];
    /// loaders that want to fail fast call it after parsing.
    pub fn validate(&self) -> RippleResult<()> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(RippleError::Graph(format!("duplicate node id '{}'", node.id)));
            }
        }

        let dangling = self.dangling_edges();
        if !dangling.is_empty() {
            let keys: Vec<String> = dangling.iter().map(|e| e.key()).collect();
            return Err(RippleError::Graph(format!(
                "{} dangling edge(s): {}",
                keys.len(),
                keys.join(", ")
            )));
        }

        Ok(())
    }

    /// Copy of the graph with every source's outgoing weights rescaled to
    /// sum to 1.
    ///
    /// Turns raw supplier volumes into "share of output" fractions. Sources
    /// whose weights sum to zero or less keep their weights.
    pub fn normalized(&self) -> Graph {
        let mut totals: HashMap<&str, f64> = HashMap::new();
        for edge in &self.edges {
            *totals.entry(edge.source.as_str()).or_insert(0.0) += edge.weight;
        }

        let edges = self
            .edges
            .iter()
            .map(|edge| {
                let total = totals.get(edge.source.as_str()).copied().unwrap_or(0.0);
                let weight = if total > 0.0 {
                    edge.weight / total
                } else {
                    edge.weight
                };
                Edge::new(edge.source.clone(), edge.target.clone(), weight)
            })
            .collect();

        Graph {
            nodes: self.nodes.clone(),
            edges,
        }
    }

    /// Outgoing adjacency index under `policy`.
    pub fn adjacency(&self, policy: DanglingEdgePolicy) -> RippleResult<Adjacency> {
        Adjacency::build(self, policy)
    }
}
