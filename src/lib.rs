//! # Sector Ripple - Core Library
//!
//! Shock propagation engine for sector risk scores.
//!
//! Every sector (keyed by its classification code) carries a baseline score
//! on a 0-100 scale. Sectors are linked by directed, weighted dependency
//! edges. A shock injected at one or more sectors ripples outward one hop
//! per round, damped on every hop and cut off once it becomes negligible.
//! The engine records each round as a [`engine::Step`] so a renderer can
//! scrub or replay the ripple without recomputing anything.
//!
//! ## Design Philosophy
//! - **Pure.** A run is a function of the graph, the initial forces and the
//!   parameters. Same inputs, same steps, bit for bit.
//! - **Bounded.** `max_steps` stops every run, whatever the damping.
//! - **Forgiving by default.** Dangling edges are skipped unless the caller
//!   asks for strict validation.

pub mod engine;
pub mod graph;
pub mod traversal;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use engine::{InitialForces, PropagationEngine, PropagationParams, Simulation, Step};
pub use graph::{DanglingEdgePolicy, Graph};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type for Sector Ripple.
#[derive(Error, Debug)]
pub enum RippleError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Edge {from}-{to} references a node that is not in the graph")]
    DanglingEdge { from: String, to: String },

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Invalid shock '{0}': expected ID=DELTA")]
    InvalidShock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

pub type RippleResult<T> = Result<T, RippleError>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Top-level configuration for Sector Ripple.
///
/// Loaded from `sector-ripple.toml` in the working directory or a path
/// supplied via CLI flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RippleConfig {
    /// Propagation tuning knobs.
    #[serde(default)]
    pub simulation: PropagationParams,

    /// Derived-seed settings.
    #[serde(default)]
    pub seeding: SeedingConfig,

    /// Graph loading settings.
    #[serde(default)]
    pub graph: GraphConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SeedingConfig {
    /// Minimum |baseline - neutral| for a node to become a seed when seeds
    /// are derived from baselines instead of supplied explicitly.
    pub min_deviation: f64,
}

impl Default for SeedingConfig {
    fn default() -> Self {
        Self { min_deviation: 1.0 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphConfig {
    /// What to do with edges whose endpoints are not in the node list.
    pub dangling_edges: DanglingEdgePolicy,

    /// Rescale each source's outgoing weights to sum to 1 before running.
    pub normalize_weights: bool,
}

impl RippleConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> RippleResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RippleConfig = toml::from_str(&content)?;
        config.simulation.validate()?;
        Ok(config)
    }

    /// Write the default configuration to a TOML file.
    pub fn write_default(path: &std::path::Path) -> RippleResult<()> {
        let config = Self::default();
        let content =
            toml::to_string_pretty(&config).map_err(|e| RippleError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Core Types
// ---------------------------------------------------------------------------

/// Closed score interval every snapshot value is clamped into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoreBounds {
    pub floor: f64,
    pub ceiling: f64,
}

impl ScoreBounds {
    /// The dashboard's 0-100 score scale.
    pub const PERCENT: ScoreBounds = ScoreBounds {
        floor: 0.0,
        ceiling: 100.0,
    };

    /// Clamp a score into the bounds.
    ///
    /// NaN collapses to the floor so snapshots never leave the interval.
    pub fn clamp(&self, score: f64) -> f64 {
        if score.is_nan() {
            return self.floor;
        }
        score.clamp(self.floor, self.ceiling)
    }

    pub fn contains(&self, score: f64) -> bool {
        score >= self.floor && score <= self.ceiling
    }
}

impl Default for ScoreBounds {
    fn default() -> Self {
        Self::PERCENT
    }
}
