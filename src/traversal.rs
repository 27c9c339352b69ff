//! # Breadth-First Traversal Replay
//!
//! Frame-by-frame breadth-first search over the dependency graph, for the
//! "how does a ripple reach everything" demo. Unlike the propagation engine
//! there are no forces here: a node is either discovered or not, and each
//! node is visited once.
//!
//! Frames are produced in this order:
//! 1. the initial state (only the start node queued and visited),
//! 2. for each dequeued node, a frame with that node as `current`,
//! 3. for each newly discovered neighbour, a frame after it is enqueued,
//! 4. a final frame with an empty queue.
//!
//! Copyright (c) 2026 Sector Ripple contributors. All rights reserved.

use std::collections::{HashSet, VecDeque};
use std::iter::FusedIterator;

use serde::{Deserialize, Serialize};

use crate::graph::{edge_key, Adjacency, DanglingEdgePolicy, Graph};
use crate::{RippleError, RippleResult};

/// One frame of the traversal replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraversalState {
    /// Node being expanded, if any.
    pub current_node: Option<String>,

    /// Pending nodes, front first.
    pub queue: Vec<String>,

    /// Nodes discovered so far, in discovery order.
    pub visited: Vec<String>,

    /// Tree edges `"parent-child"` in discovery order.
    pub path: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Dequeue,
    /// Expanding `current`; the index is the next outgoing edge to look at.
    Expand(usize),
    Done,
}

/// Lazy breadth-first traversal from a start node.
#[derive(Debug, Clone)]
pub struct BfsTraversal {
    adjacency: Adjacency,
    queue: VecDeque<String>,
    visited: Vec<String>,
    seen: HashSet<String>,
    path: Vec<String>,
    current: Option<String>,
    phase: Phase,
}

impl BfsTraversal {
    /// Start a traversal at `start`. Dangling edges are skipped.
    pub fn new(graph: &Graph, start: &str) -> RippleResult<Self> {
        if !graph.contains(start) {
            return Err(RippleError::UnknownNode(start.to_string()));
        }
        let adjacency = graph.adjacency(DanglingEdgePolicy::Ignore)?;

        let mut seen = HashSet::new();
        seen.insert(start.to_string());

        Ok(Self {
            adjacency,
            queue: VecDeque::from([start.to_string()]),
            visited: vec![start.to_string()],
            seen,
            path: Vec::new(),
            current: None,
            phase: Phase::Start,
        })
    }

    /// Nodes reachable from the start, in visiting order.
    pub fn reachable(graph: &Graph, start: &str) -> RippleResult<Vec<String>> {
        let traversal = Self::new(graph, start)?;
        Ok(traversal
            .last()
            .map(|state| state.visited)
            .unwrap_or_default())
    }

    fn state(&self) -> TraversalState {
        TraversalState {
            current_node: self.current.clone(),
            queue: self.queue.iter().cloned().collect(),
            visited: self.visited.clone(),
            path: self.path.clone(),
        }
    }
}

impl Iterator for BfsTraversal {
    type Item = TraversalState;

    fn next(&mut self) -> Option<TraversalState> {
        loop {
            match self.phase {
                Phase::Start => {
                    self.phase = Phase::Dequeue;
                    return Some(self.state());
                }
                Phase::Dequeue => match self.queue.pop_front() {
                    Some(node) => {
                        self.current = Some(node);
                        self.phase = Phase::Expand(0);
                        return Some(self.state());
                    }
                    None => {
                        self.current = None;
                        self.phase = Phase::Done;
                        return Some(self.state());
                    }
                },
                Phase::Expand(position) => {
                    let Some(current) = self.current.clone() else {
                        self.phase = Phase::Dequeue;
                        continue;
                    };
                    let outgoing = self.adjacency.outgoing(&current);
                    let Some(edge) = outgoing.get(position) else {
                        self.phase = Phase::Dequeue;
                        continue;
                    };
                    self.phase = Phase::Expand(position + 1);

                    let target = edge.target.clone();
                    if self.seen.insert(target.clone()) {
                        self.path.push(edge_key(&current, &target));
                        self.visited.push(target.clone());
                        self.queue.push_back(target);
                        return Some(self.state());
                    }
                }
                Phase::Done => return None,
            }
        }
    }
}

impl FusedIterator for BfsTraversal {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node};

    fn diamond() -> Graph {
        Graph::new(
            vec![
                Node::new("A", 50.0),
                Node::new("B", 50.0),
                Node::new("C", 50.0),
                Node::new("D", 50.0),
                Node::new("E", 50.0),
            ],
            vec![
                Edge::new("A", "B", 1.0),
                Edge::new("A", "C", 1.0),
                Edge::new("B", "D", 1.0),
                Edge::new("C", "D", 1.0),
                Edge::new("D", "A", 1.0),
                Edge::new("D", "X", 1.0),
            ],
        )
    }

    #[test]
    fn test_frame_sequence() {
        let frames: Vec<TraversalState> = BfsTraversal::new(&diamond(), "A").unwrap().collect();

        // start, A, +B, +C, B, +D, C, D, final
        assert_eq!(frames.len(), 9);

        assert_eq!(frames[0].current_node, None);
        assert_eq!(frames[0].queue, vec!["A"]);
        assert_eq!(frames[0].visited, vec!["A"]);

        assert_eq!(frames[1].current_node.as_deref(), Some("A"));
        assert!(frames[1].queue.is_empty());

        assert_eq!(frames[2].queue, vec!["B"]);
        assert_eq!(frames[3].queue, vec!["B", "C"]);
        assert_eq!(frames[5].path, vec!["A-B", "A-C", "B-D"]);

        let last = frames.last().unwrap();
        assert_eq!(last.current_node, None);
        assert!(last.queue.is_empty());
        assert_eq!(last.visited, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_unreachable_nodes_are_not_visited() {
        let visited = BfsTraversal::reachable(&diamond(), "A").unwrap();
        assert!(!visited.contains(&"E".to_string()));
        assert!(!visited.contains(&"X".to_string()));
    }

    #[test]
    fn test_isolated_start_yields_three_frames() {
        let frames: Vec<TraversalState> = BfsTraversal::new(&diamond(), "E").unwrap().collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].visited, vec!["E"]);
        assert!(frames[2].path.is_empty());
    }

    #[test]
    fn test_unknown_start_is_an_error() {
        let result = BfsTraversal::new(&diamond(), "Q");
        assert!(matches!(result, Err(RippleError::UnknownNode(_))));
    }

    #[test]
    fn test_traversal_is_deterministic() {
        let a: Vec<TraversalState> = BfsTraversal::new(&diamond(), "C").unwrap().collect();
        let b: Vec<TraversalState> = BfsTraversal::new(&diamond(), "C").unwrap().collect();
        assert_eq!(a, b);
    }
}
