// Sector Ripple - Propagation Engine
// steps.rs - Step records, the lazy Propagation iterator and Simulation
//
// All maps and sets here are ordered. Wave-front sums are accumulated in
// node-id order, then edge insertion order, so the same inputs always
// produce bit-identical scores.
//
// Copyright (c) 2026 Sector Ripple contributors. All rights reserved.

use std::collections::{BTreeMap, BTreeSet};
use std::iter::FusedIterator;

use serde::{Deserialize, Serialize};

use crate::engine::PropagationParams;
use crate::graph::Adjacency;

/// One frame of the ripple replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Position in the sequence. Step 0 is the pre-propagation snapshot.
    pub index: usize,

    /// Nodes carrying force in this step.
    #[serde(rename = "activeNodeIds")]
    pub active_nodes: BTreeSet<String>,

    /// `"source-target"` keys of the edges that fired into this step.
    #[serde(rename = "activeEdgeIds")]
    pub active_edges: BTreeSet<String>,

    /// Force carried by each active node (the initial forces for step 0,
    /// the summed incoming contributions afterwards).
    pub forces: BTreeMap<String, f64>,

    /// Clamped score of every node at this point.
    #[serde(rename = "currentScores")]
    pub scores: BTreeMap<String, f64>,
}

impl Step {
    pub fn is_initial(&self) -> bool {
        self.index == 0
    }

    pub fn score(&self, id: &str) -> Option<f64> {
        self.scores.get(id).copied()
    }

    pub fn force(&self, id: &str) -> Option<f64> {
        self.forces.get(id).copied()
    }

    pub fn is_node_active(&self, id: &str) -> bool {
        self.active_nodes.contains(id)
    }

    pub fn is_edge_active(&self, key: &str) -> bool {
        self.active_edges.contains(key)
    }
}

/// Restartable, lazily evaluated step sequence of one run.
///
/// Produced by [`PropagationEngine::steps`](crate::engine::PropagationEngine::steps).
/// Yields the initial step, then one step per round in which at least one
/// edge fired, for at most `max_steps` rounds.
#[derive(Debug, Clone)]
pub struct Propagation<'a> {
    adjacency: &'a Adjacency,
    baselines: &'a BTreeMap<String, f64>,
    params: PropagationParams,
    wave_front: BTreeMap<String, f64>,
    total_impact: BTreeMap<String, f64>,
    next_index: usize,
    finished: bool,
}

impl<'a> Propagation<'a> {
    pub(crate) fn new(
        adjacency: &'a Adjacency,
        baselines: &'a BTreeMap<String, f64>,
        params: PropagationParams,
        wave_front: BTreeMap<String, f64>,
    ) -> Self {
        let total_impact = baselines.keys().map(|id| (id.clone(), 0.0)).collect();
        Self {
            adjacency,
            baselines,
            params,
            wave_front,
            total_impact,
            next_index: 0,
            finished: false,
        }
    }

    /// Accumulated (unclamped) impact per node so far.
    pub fn total_impact(&self) -> &BTreeMap<String, f64> {
        &self.total_impact
    }

    fn snapshot(&self) -> BTreeMap<String, f64> {
        let bounds = self.params.bounds();
        self.baselines
            .iter()
            .map(|(id, base)| {
                let impact = self.total_impact.get(id).copied().unwrap_or(0.0);
                (id.clone(), bounds.clamp(base + impact))
            })
            .collect()
    }

    fn initial_step(&mut self) -> Step {
        self.next_index = 1;
        if self.wave_front.is_empty() {
            self.finished = true;
        }
        Step {
            index: 0,
            active_nodes: self.wave_front.keys().cloned().collect(),
            active_edges: BTreeSet::new(),
            forces: self.wave_front.clone(),
            scores: self.snapshot(),
        }
    }

    /// One round: push every wave-front force across its outgoing edges.
    fn advance(&mut self) -> Option<Step> {
        let damping = self.params.damping;
        let threshold = self.params.threshold;

        let mut next_front: BTreeMap<String, f64> = BTreeMap::new();
        let mut fired: BTreeSet<String> = BTreeSet::new();

        for (source, force) in &self.wave_front {
            for edge in self.adjacency.outgoing(source) {
                let passed = force * edge.weight * damping;
                // NaN never fires.
                if !(passed.abs() >= threshold) {
                    continue;
                }
                *next_front.entry(edge.target.clone()).or_insert(0.0) += passed;
                fired.insert(edge.key.clone());
            }
        }

        if next_front.is_empty() {
            log::debug!("Ripple died out after {} round(s)", self.next_index - 1);
            return None;
        }

        for (id, delta) in &next_front {
            *self.total_impact.entry(id.clone()).or_insert(0.0) += delta;
        }

        log::debug!(
            "Round {}: {} edge(s) fired, {} node(s) active",
            self.next_index,
            fired.len(),
            next_front.len()
        );

        let step = Step {
            index: self.next_index,
            active_nodes: next_front.keys().cloned().collect(),
            active_edges: fired,
            forces: next_front.clone(),
            scores: self.snapshot(),
        };

        self.wave_front = next_front;
        self.next_index += 1;
        Some(step)
    }
}

impl Iterator for Propagation<'_> {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        if self.finished {
            return None;
        }
        if self.next_index == 0 {
            return Some(self.initial_step());
        }
        if self.next_index > self.params.max_steps {
            log::debug!("Step ceiling reached ({})", self.params.max_steps);
            self.finished = true;
            return None;
        }

        let step = self.advance();
        if step.is_none() {
            self.finished = true;
        }
        step
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            return (0, Some(0));
        }
        let emitted = self.next_index;
        let remaining = self.params.max_steps.saturating_add(1).saturating_sub(emitted);
        let lower = if emitted == 0 { 1 } else { 0 };
        (lower, Some(remaining))
    }
}

impl FusedIterator for Propagation<'_> {}

/// Fully materialized step sequence of one run.
///
/// Never empty: the initial step always exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Simulation {
    steps: Vec<Step>,
    baselines: BTreeMap<String, f64>,
    total_impact: BTreeMap<String, f64>,
}

impl Simulation {
    pub(crate) fn new(
        steps: Vec<Step>,
        baselines: BTreeMap<String, f64>,
        total_impact: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            steps,
            baselines,
            total_impact,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step at a scrub position.
    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn first(&self) -> Option<&Step> {
        self.steps.first()
    }

    pub fn last(&self) -> Option<&Step> {
        self.steps.last()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.steps.iter()
    }

    /// Number of propagation rounds (steps after the initial one).
    pub fn rounds(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    pub fn baselines(&self) -> &BTreeMap<String, f64> {
        &self.baselines
    }

    /// Summed force each node received over the run, before clamping.
    ///
    /// Differs from [`score_changes`](Self::score_changes) once a score hits
    /// a bound.
    pub fn total_impact(&self) -> &BTreeMap<String, f64> {
        &self.total_impact
    }

    /// Scores after the last step.
    pub fn final_scores(&self) -> BTreeMap<String, f64> {
        self.last().map(|s| s.scores.clone()).unwrap_or_default()
    }

    /// Final score minus baseline for every node.
    pub fn score_changes(&self) -> BTreeMap<String, f64> {
        self.final_scores()
            .into_iter()
            .map(|(id, score)| {
                let base = self.baselines.get(&id).copied().unwrap_or(score);
                (id, score - base)
            })
            .collect()
    }

    /// The `n` nodes whose score moved the most, by absolute change.
    ///
    /// Nodes that did not move are left out. Ties keep node-id order.
    pub fn most_impacted(&self, n: usize) -> Vec<(String, f64)> {
        let mut changes: Vec<(String, f64)> = self
            .score_changes()
            .into_iter()
            .filter(|(_, change)| *change != 0.0)
            .collect();

        changes.sort_by(|a, b| {
            b.1.abs()
                .partial_cmp(&a.1.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        changes.truncate(n);
        changes
    }

    /// Every edge key that fired at least once during the run.
    pub fn fired_edges(&self) -> BTreeSet<String> {
        self.steps
            .iter()
            .flat_map(|s| s.active_edges.iter().cloned())
            .collect()
    }
}

impl<'s> IntoIterator for &'s Simulation {
    type Item = &'s Step;
    type IntoIter = std::slice::Iter<'s, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::{InitialForces, PropagationEngine, PropagationParams};
    use crate::graph::{DanglingEdgePolicy, Edge, Graph, Node};

    fn engine(graph: Graph, damping: f64, threshold: f64, max_steps: usize) -> PropagationEngine {
        let params = PropagationParams {
            damping,
            threshold,
            max_steps,
            ..Default::default()
        };
        PropagationEngine::new(graph, params, DanglingEdgePolicy::Ignore).unwrap()
    }

    fn star() -> Graph {
        // A fans out to B and C; both feed D.
        Graph::new(
            vec![
                Node::new("A", 50.0),
                Node::new("B", 50.0),
                Node::new("C", 50.0),
                Node::new("D", 50.0),
            ],
            vec![
                Edge::new("A", "B", 0.5),
                Edge::new("A", "C", 1.0),
                Edge::new("B", "D", 1.0),
                Edge::new("C", "D", 0.5),
            ],
        )
    }

    #[test]
    fn test_initial_step_holds_seeds_and_baseline() {
        let engine = engine(star(), 0.9, 1.0, 10);
        let mut steps = engine
            .steps(&InitialForces::explicit([("A", 20.0)]))
            .unwrap();
        let first = steps.next().unwrap();
        assert!(first.is_initial());
        assert!(first.is_node_active("A"));
        assert!(first.active_edges.is_empty());
        assert_eq!(first.force("A"), Some(20.0));
        assert!(first.scores.values().all(|s| *s == 50.0));
    }

    #[test]
    fn test_contributions_to_same_target_are_summed() {
        let engine = engine(star(), 1.0, 0.01, 10);
        let sim = engine.run(&InitialForces::explicit([("A", 20.0)])).unwrap();

        // Round 1: B gets 10, C gets 20. Round 2: D gets 10 + 10.
        let round_two = sim.get(2).unwrap();
        assert_eq!(
            round_two.active_nodes.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["D"]
        );
        assert!(round_two.is_edge_active("B-D"));
        assert!(round_two.is_edge_active("C-D"));
        assert!((round_two.force("D").unwrap() - 20.0).abs() < 1e-9);
        assert!((round_two.score("D").unwrap() - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_weak_edge_does_not_fire_while_strong_one_does() {
        let engine = engine(star(), 1.0, 15.0, 10);
        let sim = engine.run(&InitialForces::explicit([("A", 20.0)])).unwrap();

        let round_one = sim.get(1).unwrap();
        assert!(round_one.is_edge_active("A-C"));
        assert!(!round_one.is_edge_active("A-B"));
        assert!(!round_one.is_node_active("B"));
        assert_eq!(round_one.score("B"), Some(50.0));
    }

    #[test]
    fn test_scores_accumulate_across_rounds() {
        // A -> B -> A cycle: A is hit again in round 2.
        let graph = Graph::new(
            vec![Node::new("A", 50.0), Node::new("B", 50.0)],
            vec![Edge::new("A", "B", 1.0), Edge::new("B", "A", 1.0)],
        );
        let engine = engine(graph, 0.5, 1.0, 10);
        let sim = engine.run(&InitialForces::explicit([("A", 16.0)])).unwrap();

        // Forces: 8 (B), 4 (A), 2 (B), 1 (A), then 0.5 < threshold.
        assert_eq!(sim.len(), 5);
        let last = sim.last().unwrap();
        assert!((last.score("A").unwrap() - 55.0).abs() < 1e-9);
        assert!((last.score("B").unwrap() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_shock_lowers_scores_and_clamps_at_floor() {
        let graph = Graph::new(
            vec![Node::new("A", 50.0), Node::new("B", 5.0)],
            vec![Edge::new("A", "B", 1.0)],
        );
        let engine = engine(graph, 0.9, 0.1, 10);
        let sim = engine.run(&InitialForces::explicit([("A", -40.0)])).unwrap();
        let last = sim.last().unwrap();
        assert_eq!(last.score("B"), Some(0.0));
        assert_eq!(last.force("B"), Some(-36.0));
    }

    #[test]
    fn test_iterator_is_fused() {
        let engine = engine(star(), 0.9, 1.0, 10);
        let mut steps = engine.steps(&InitialForces::new()).unwrap();
        assert!(steps.next().is_some());
        assert!(steps.next().is_none());
        assert!(steps.next().is_none());
    }

    #[test]
    fn test_size_hint_bounds_length() {
        let engine = engine(star(), 0.9, 1.0, 3);
        let steps = engine
            .steps(&InitialForces::explicit([("A", 20.0)]))
            .unwrap();
        assert_eq!(steps.size_hint(), (1, Some(4)));
    }

    #[test]
    fn test_unbounded_step_ceiling_does_not_overflow() {
        let graph = Graph::new(
            vec![Node::new("A", 50.0), Node::new("B", 50.0)],
            vec![Edge::new("A", "B", 1.0)],
        );
        let engine = engine(graph, 0.9, 0.1, usize::MAX);
        let forces = InitialForces::explicit([("A", 20.0)]);

        let steps = engine.steps(&forces).unwrap();
        assert_eq!(steps.size_hint(), (1, Some(usize::MAX)));

        let sim = engine.run(&forces).unwrap();
        assert_eq!(sim.len(), 2);
        assert!((sim.last().unwrap().score("B").unwrap() - 68.0).abs() < 1e-9);
    }

    #[test]
    fn test_parallel_edges_fire_together_under_one_key() {
        let graph = Graph::new(
            vec![Node::new("A", 50.0), Node::new("B", 50.0)],
            vec![Edge::new("A", "B", 0.5), Edge::new("A", "B", 0.25)],
        );
        let engine = engine(graph, 1.0, 0.01, 10);
        let sim = engine.run(&InitialForces::explicit([("A", 20.0)])).unwrap();

        assert_eq!(sim.len(), 2);
        let round_one = sim.get(1).unwrap();
        let keys: Vec<&str> = round_one.active_edges.iter().map(String::as_str).collect();
        assert_eq!(keys, vec!["A-B"]);
        assert!((round_one.force("B").unwrap() - 15.0).abs() < 1e-9);
        assert!((round_one.score("B").unwrap() - 65.0).abs() < 1e-9);
    }

    #[test]
    fn test_total_impact_is_unclamped() {
        let graph = Graph::new(
            vec![Node::new("A", 50.0), Node::new("B", 95.0)],
            vec![Edge::new("A", "B", 1.0)],
        );
        let engine = engine(graph, 1.0, 0.1, 10);
        let sim = engine.run(&InitialForces::explicit([("A", 40.0)])).unwrap();

        assert!((sim.total_impact()["B"] - 40.0).abs() < 1e-9);
        assert!((sim.score_changes()["B"] - 5.0).abs() < 1e-9);
        assert_eq!(sim.total_impact()["A"], 0.0);
    }

    #[test]
    fn test_max_steps_zero_yields_only_initial_step() {
        let engine = engine(star(), 0.9, 0.0, 0);
        let sim = engine.run(&InitialForces::explicit([("A", 20.0)])).unwrap();
        assert_eq!(sim.len(), 1);
        assert_eq!(sim.rounds(), 0);
    }

    #[test]
    fn test_most_impacted_orders_by_absolute_change() {
        let engine = engine(star(), 1.0, 0.01, 1);
        let sim = engine.run(&InitialForces::explicit([("A", 20.0)])).unwrap();
        let top = sim.most_impacted(5);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, "C");
        assert!((top[0].1 - 20.0).abs() < 1e-9);
        assert_eq!(top[1].0, "B");
    }

    #[test]
    fn test_fired_edges_collects_whole_run() {
        let engine = engine(star(), 1.0, 0.01, 10);
        let sim = engine.run(&InitialForces::explicit([("A", 20.0)])).unwrap();
        let fired: Vec<String> = sim.fired_edges().into_iter().collect();
        assert_eq!(fired, vec!["A-B", "A-C", "B-D", "C-D"]);
    }

    #[test]
    fn test_step_serializes_with_renderer_field_names() {
        let engine = engine(star(), 0.9, 1.0, 10);
        let sim = engine.run(&InitialForces::explicit([("A", 20.0)])).unwrap();
        let json = serde_json::to_value(sim.get(1).unwrap()).unwrap();
        assert!(json.get("activeNodeIds").is_some());
        assert!(json.get("activeEdgeIds").is_some());
        assert!(json.get("currentScores").is_some());
        assert_eq!(json["index"], 1);
    }
}
