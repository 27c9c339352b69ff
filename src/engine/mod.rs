// Sector Ripple - Propagation Engine
// mod.rs - Parameters, initial forces and the PropagationEngine
//
// A shock is a signed deviation from the neutral score injected at one or
// more seed sectors. Each round every node on the wave front pushes
// `force * weight * damping` along its outgoing edges; contributions below
// the threshold do not fire. The run stops when nothing fires or after
// `max_steps` rounds, whichever comes first.
//
// Copyright (c) 2026 Sector Ripple contributors. All rights reserved.

pub mod steps;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use steps::{Propagation, Simulation, Step};

use crate::graph::{Adjacency, DanglingEdgePolicy, Graph};
use crate::{RippleConfig, RippleError, RippleResult, ScoreBounds};

/// Tunable constants of a propagation run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PropagationParams {
    /// Multiplicative decay applied to force on every hop.
    /// Default: 0.9
    pub damping: f64,

    /// Minimum |force| an edge must carry to fire.
    /// Default: 0.1
    pub threshold: f64,

    /// Hard ceiling on propagation rounds after the initial step.
    /// Default: 10
    pub max_steps: usize,

    /// Score that counts as "no deviation" when deriving seeds.
    /// Default: 50.0
    pub neutral_score: f64,

    /// Lower bound of every snapshot score.
    /// Default: 0.0
    pub score_floor: f64,

    /// Upper bound of every snapshot score.
    /// Default: 100.0
    pub score_ceiling: f64,
}

impl Default for PropagationParams {
    fn default() -> Self {
        Self {
            damping: 0.9,
            threshold: 0.1,
            max_steps: 10,
            neutral_score: 50.0,
            score_floor: ScoreBounds::PERCENT.floor,
            score_ceiling: ScoreBounds::PERCENT.ceiling,
        }
    }
}

impl PropagationParams {
    pub fn bounds(&self) -> ScoreBounds {
        ScoreBounds {
            floor: self.score_floor,
            ceiling: self.score_ceiling,
        }
    }

    /// Reject parameters the engine cannot interpret.
    ///
    /// Non-decaying damping and non-positive thresholds are legal: the run
    /// is still capped by `max_steps`. They are only logged.
    pub fn validate(&self) -> RippleResult<()> {
        if !self.damping.is_finite() {
            return Err(RippleError::Config(format!(
                "damping must be finite, got {}",
                self.damping
            )));
        }
        if !self.threshold.is_finite() {
            return Err(RippleError::Config(format!(
                "threshold must be finite, got {}",
                self.threshold
            )));
        }
        if !self.neutral_score.is_finite() {
            return Err(RippleError::Config(format!(
                "neutral_score must be finite, got {}",
                self.neutral_score
            )));
        }
        if !self.score_floor.is_finite()
            || !self.score_ceiling.is_finite()
            || self.score_floor > self.score_ceiling
        {
            return Err(RippleError::Config(format!(
                "invalid score bounds [{}, {}]",
                self.score_floor, self.score_ceiling
            )));
        }

        if self.damping.abs() >= 1.0 {
            log::warn!(
                "damping {} does not decay; runs will stop at max_steps ({})",
                self.damping,
                self.max_steps
            );
        }
        if self.threshold <= 0.0 {
            log::warn!(
                "threshold {} never cuts propagation; runs will stop at max_steps ({})",
                self.threshold,
                self.max_steps
            );
        }

        Ok(())
    }
}

/// Initial per-node forces seeding a run.
///
/// Only non-zero, finite forces are kept. Iteration is in node-id order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InitialForces {
    forces: BTreeMap<String, f64>,
}

impl InitialForces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit per-node deltas, as set by a shock slider.
    ///
    /// A later entry for the same node replaces an earlier one.
    pub fn explicit<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let mut forces = Self::new();
        for (id, force) in entries {
            forces.set(id, force);
        }
        forces
    }

    /// Seeds derived from baselines: every node at least `min_deviation`
    /// away from `neutral` is seeded with `baseline - neutral`.
    pub fn derived(graph: &Graph, neutral: f64, min_deviation: f64) -> Self {
        let mut forces = Self::new();
        for node in &graph.nodes {
            let deviation = node.deviation(neutral);
            if deviation.abs() >= min_deviation {
                forces.set(node.id.clone(), deviation);
            }
        }
        log::debug!(
            "Derived {} seed(s) from {} node(s) (neutral {}, min deviation {})",
            forces.len(),
            graph.nodes.len(),
            neutral,
            min_deviation
        );
        forces
    }

    /// Set the force on `id`. Zero or non-finite clears it.
    pub fn set(&mut self, id: impl Into<String>, force: f64) {
        let id = id.into();
        if force != 0.0 && force.is_finite() {
            self.forces.insert(id, force);
        } else {
            self.forces.remove(&id);
        }
    }

    pub fn get(&self, id: &str) -> Option<f64> {
        self.forces.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.forces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.forces.iter().map(|(id, f)| (id.as_str(), *f))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for InitialForces {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self::explicit(iter)
    }
}

/// Runs shock propagation over one graph.
///
/// Adjacency and baselines are built once in [`PropagationEngine::new`].
/// Every call to [`steps`](Self::steps) or [`run`](Self::run) starts from a
/// clean wave front, so independent runs never share state.
#[derive(Debug, Clone)]
pub struct PropagationEngine {
    graph: Graph,
    adjacency: Adjacency,
    baselines: BTreeMap<String, f64>,
    params: PropagationParams,
    policy: DanglingEdgePolicy,
}

impl PropagationEngine {
    pub fn new(
        graph: Graph,
        params: PropagationParams,
        policy: DanglingEdgePolicy,
    ) -> RippleResult<Self> {
        params.validate()?;
        let adjacency = graph.adjacency(policy)?;
        let baselines = graph.baselines();

        log::debug!(
            "Propagation engine ready: {} nodes, {} edges indexed, {} skipped",
            baselines.len(),
            adjacency.edge_count(),
            adjacency.skipped_count()
        );

        Ok(Self {
            graph,
            adjacency,
            baselines,
            params,
            policy,
        })
    }

    /// Engine with default parameters and the `Ignore` policy.
    pub fn with_defaults(graph: Graph) -> RippleResult<Self> {
        Self::new(graph, PropagationParams::default(), DanglingEdgePolicy::Ignore)
    }

    /// Engine configured from a [`RippleConfig`], normalizing weights first
    /// when the config asks for it.
    pub fn from_config(graph: Graph, config: &RippleConfig) -> RippleResult<Self> {
        let graph = if config.graph.normalize_weights {
            graph.normalized()
        } else {
            graph
        };
        Self::new(graph, config.simulation, config.graph.dangling_edges)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn params(&self) -> &PropagationParams {
        &self.params
    }

    pub fn adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    /// Seeds derived from this graph's baselines around the configured
    /// neutral score.
    pub fn derive_forces(&self, min_deviation: f64) -> InitialForces {
        InitialForces::derived(&self.graph, self.params.neutral_score, min_deviation)
    }

    /// Lazily produce the step sequence for `forces`.
    ///
    /// Forces on ids that are not graph nodes are dropped under the
    /// `Ignore` policy and rejected under `Reject`.
    pub fn steps(&self, forces: &InitialForces) -> RippleResult<Propagation<'_>> {
        let mut wave_front = BTreeMap::new();
        for (id, force) in forces.iter() {
            if self.baselines.contains_key(id) {
                wave_front.insert(id.to_string(), force);
                continue;
            }
            match self.policy {
                DanglingEdgePolicy::Ignore => {
                    log::warn!("Ignoring shock on unknown node {}", id);
                }
                DanglingEdgePolicy::Reject => {
                    return Err(RippleError::UnknownNode(id.to_string()));
                }
            }
        }

        Ok(Propagation::new(
            &self.adjacency,
            &self.baselines,
            self.params,
            wave_front,
        ))
    }

    /// Eagerly compute the full step sequence for `forces`.
    pub fn run(&self, forces: &InitialForces) -> RippleResult<Simulation> {
        let mut propagation = self.steps(forces)?;
        let steps: Vec<Step> = propagation.by_ref().collect();
        log::info!(
            "Propagation finished: {} seed(s), {} step(s)",
            forces.len(),
            steps.len()
        );
        Ok(Simulation::new(
            steps,
            self.baselines.clone(),
            propagation.total_impact().clone(),
        ))
    }

    /// Final score of every node after the ripple settles.
    pub fn market_state(&self, forces: &InitialForces) -> RippleResult<BTreeMap<String, f64>> {
        Ok(self.run(forces)?.final_scores())
    }
}
