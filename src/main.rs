//! # Sector Ripple - CLI Entry Point
//!
//! Command-line interface for the shock propagation engine.
//!
//! Commands:
//! - `simulate`    - Run a shock through a graph and print the step sequence
//! - `traverse`    - Print a breadth-first traversal replay
//! - `init-config` - Generate a default configuration file

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

use sector_ripple::traversal::{BfsTraversal, TraversalState};
use sector_ripple::{
    Graph, InitialForces, PropagationEngine, PropagationParams, RippleConfig, RippleError,
    RippleResult, Simulation,
};

/// Sector Ripple - damped shock propagation over sector dependency graphs.
#[derive(Parser, Debug)]
#[command(name = "sector-ripple")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "sector-ripple.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Propagate a shock and print every step.
    Simulate {
        /// Graph JSON file (`{"nodes": [...], "edges": [...]}`).
        #[arg(short, long)]
        graph: PathBuf,

        /// Explicit shock as ID=DELTA. Repeatable.
        #[arg(short, long = "shock", value_name = "ID=DELTA")]
        shocks: Vec<String>,

        /// Seed every node whose baseline deviates from neutral.
        #[arg(long, conflicts_with = "shocks")]
        derive: bool,

        /// Print a human-readable summary instead of JSON.
        #[arg(long)]
        summary: bool,
    },

    /// Replay a breadth-first traversal from a start node.
    Traverse {
        /// Graph JSON file.
        #[arg(short, long)]
        graph: PathBuf,

        /// Node id to start from.
        #[arg(short, long)]
        start: String,
    },

    /// Generate a default configuration file.
    InitConfig,
}

/// Outgoing links listed next to each impacted sector in `--summary`.
const SUMMARY_SUCCESSORS: usize = 3;

/// JSON document printed by `simulate`.
#[derive(Serialize)]
struct SimulationReport<'a> {
    generated_at: DateTime<Utc>,
    params: &'a PropagationParams,
    seeds: &'a InitialForces,
    simulation: &'a Simulation,
}

fn main() -> RippleResult<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            graph,
            shocks,
            derive,
            summary,
        } => cmd_simulate(&cli.config, &graph, &shocks, derive, summary),
        Commands::Traverse { graph, start } => cmd_traverse(&graph, &start),
        Commands::InitConfig => cmd_init_config(&cli.config),
    }
}

fn load_config(config_path: &Path) -> RippleResult<RippleConfig> {
    if config_path.exists() {
        info!("Loading configuration from: {}", config_path.display());
        RippleConfig::from_file(config_path)
    } else {
        info!("No config file found, using defaults. Run 'init-config' to generate one.");
        Ok(RippleConfig::default())
    }
}

/// Run the engine and print the report.
fn cmd_simulate(
    config_path: &Path,
    graph_path: &Path,
    shocks: &[String],
    derive: bool,
    summary: bool,
) -> RippleResult<()> {
    let config = load_config(config_path)?;
    let graph = Graph::load(graph_path)?;
    let engine = PropagationEngine::from_config(graph, &config)?;

    let seeds = if derive {
        engine.derive_forces(config.seeding.min_deviation)
    } else {
        parse_shocks(shocks)?
    };
    info!("Simulating with {} seed(s)", seeds.len());

    let simulation = engine.run(&seeds)?;

    if summary {
        print_summary(&engine, &simulation);
        return Ok(());
    }

    let report = SimulationReport {
        generated_at: Utc::now(),
        params: engine.params(),
        seeds: &seeds,
        simulation: &simulation,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_summary(engine: &PropagationEngine, simulation: &Simulation) {
    let params = engine.params();
    println!(
        "Propagation: {} step(s) (damping {}, threshold {}, max steps {})",
        simulation.len(),
        params.damping,
        params.threshold,
        params.max_steps,
    );

    for step in simulation {
        let nodes: Vec<&str> = step.active_nodes.iter().map(String::as_str).collect();
        let edges: Vec<&str> = step.active_edges.iter().map(String::as_str).collect();
        println!(
            "  Step {:>2}: nodes [{}] edges [{}]",
            step.index,
            nodes.join(", "),
            edges.join(", "),
        );
    }

    let impacted = simulation.most_impacted(10);
    if impacted.is_empty() {
        println!("No score changed.");
        return;
    }

    println!();
    println!("Most impacted:");
    for (id, change) in impacted {
        let downstream = format_successors(engine, &id);
        let name = engine
            .graph()
            .node(&id)
            .map(|n| n.display_name().to_string())
            .unwrap_or(id);
        println!("  {:<24} {:+.2}{}", name, change, downstream);
    }
}

/// Strongest outgoing links of `id`, e.g. `"  -> 68 (0.80), 41 (0.50)"`.
fn format_successors(engine: &PropagationEngine, id: &str) -> String {
    let successors = engine
        .adjacency()
        .strongest_successors(id, SUMMARY_SUCCESSORS);
    if successors.is_empty() {
        return String::new();
    }
    let links: Vec<String> = successors
        .iter()
        .map(|(target, weight)| format!("{} ({:.2})", target, weight))
        .collect();
    format!("  -> {}", links.join(", "))
}

/// Print the traversal frames as JSON.
fn cmd_traverse(graph_path: &Path, start: &str) -> RippleResult<()> {
    let graph = Graph::load(graph_path)?;
    let frames: Vec<TraversalState> = BfsTraversal::new(&graph, start)?.collect();
    info!("Traversal from {} produced {} frame(s)", start, frames.len());
    println!("{}", serde_json::to_string_pretty(&frames)?);
    Ok(())
}

/// Generate a default configuration file.
fn cmd_init_config(config_path: &Path) -> RippleResult<()> {
    if config_path.exists() {
        return Err(RippleError::Config(format!(
            "Configuration file already exists: {}. Remove it first or use a different path.",
            config_path.display()
        )));
    }

    RippleConfig::write_default(config_path)?;
    println!("Default configuration written to: {}", config_path.display());
    println!();
    println!("Key settings:");
    println!("  [simulation] - damping (0.9), threshold (0.1), max_steps (10)");
    println!("  [seeding]    - min_deviation for --derive (1.0)");
    println!("  [graph]      - dangling_edges = \"ignore\" | \"reject\", normalize_weights");

    Ok(())
}

// ---------------------------------------------------------------------------
// Shock parsing
// ---------------------------------------------------------------------------

/// Parse one `ID=DELTA` shock.
fn parse_shock(raw: &str) -> RippleResult<(String, f64)> {
    let (id, delta) = raw
        .split_once('=')
        .ok_or_else(|| RippleError::InvalidShock(raw.to_string()))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(RippleError::InvalidShock(raw.to_string()));
    }
    let delta: f64 = delta
        .trim()
        .parse()
        .map_err(|_| RippleError::InvalidShock(raw.to_string()))?;
    if !delta.is_finite() {
        return Err(RippleError::InvalidShock(raw.to_string()));
    }
    Ok((id.to_string(), delta))
}

fn parse_shocks(raw: &[String]) -> RippleResult<InitialForces> {
    raw.iter()
        .map(|s| parse_shock(s))
        .collect::<RippleResult<Vec<_>>>()
        .map(InitialForces::explicit)
}
