// Sector Ripple - Dependency Graph
// edges.rs - Directed weighted edges and the outgoing adjacency index
//
// Edge weight is the fraction of a shock that the source passes on to the
// target. Weights are not clamped; values above 1 amplify.
//
// Copyright (c) 2026 Sector Ripple contributors. All rights reserved.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::graph::{DanglingEdgePolicy, Graph};
use crate::{RippleError, RippleResult};

/// A directed influence relation `source -> target`.
///
/// Parallel edges between the same pair are allowed and fire independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub weight: f64,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, weight: f64) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            weight,
        }
    }

    /// Renderer key, `"source-target"`.
    pub fn key(&self) -> String {
        edge_key(&self.source, &self.target)
    }
}

/// Format the renderer key for a directed pair.
pub fn edge_key(source: &str, target: &str) -> String {
    format!("{}-{}", source, target)
}

/// One entry of a node's outgoing list.
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub target: String,
    pub weight: f64,
    /// Precomputed `"source-target"` key.
    pub key: String,
}

/// Outgoing edge lists per source, in edge insertion order.
///
/// Built once per engine and read-only afterwards. Edges whose source or
/// target is not a node of the graph never enter the index.
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    outgoing: HashMap<String, Vec<Outgoing>>,
    edge_count: usize,
    skipped: usize,
}

impl Adjacency {
    /// Index `graph`'s edges under the given dangling-edge policy.
    pub fn build(graph: &Graph, policy: DanglingEdgePolicy) -> RippleResult<Self> {
        let known: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        let mut adjacency = Self::default();

        for edge in &graph.edges {
            if !known.contains(edge.source.as_str()) || !known.contains(edge.target.as_str()) {
                match policy {
                    DanglingEdgePolicy::Ignore => {
                        log::warn!("Skipping dangling edge {}", edge.key());
                        adjacency.skipped += 1;
                        continue;
                    }
                    DanglingEdgePolicy::Reject => {
                        return Err(RippleError::DanglingEdge {
                            from: edge.source.clone(),
                            to: edge.target.clone(),
                        });
                    }
                }
            }

            adjacency
                .outgoing
                .entry(edge.source.clone())
                .or_default()
                .push(Outgoing {
                    target: edge.target.clone(),
                    weight: edge.weight,
                    key: edge.key(),
                });
            adjacency.edge_count += 1;
        }

        Ok(adjacency)
    }

    /// Outgoing edges of `id`. Unknown ids have none.
    pub fn outgoing(&self, id: &str) -> &[Outgoing] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of indexed edges.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Number of edges dropped by the `Ignore` policy.
    pub fn skipped_count(&self) -> usize {
        self.skipped
    }

    /// Outgoing edges of `id` sorted by weight descending.
    pub fn strongest_successors(&self, id: &str, n: usize) -> Vec<(&str, f64)> {
        let mut successors: Vec<(&str, f64)> = self
            .outgoing(id)
            .iter()
            .map(|o| (o.target.as_str(), o.weight))
            .collect();

        successors.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        successors.truncate(n);
        successors
    }
}
