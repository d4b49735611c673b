//! Canopy simulation runner
//!
//! Build a random topology, run the protocol to convergence and compare the
//! resulting tree with the reference MST.
//!
//! ```text
//! canopy-sim [nodes] [seed] [timeline.json]
//! ```

use std::env;
use std::fs::File;
use std::io::BufWriter;

use canopy_ghs::MessageKind;
use canopy_sim::{RunReport, Simulation, SimulationConfig, TimelineEvent, TreeSnapshot};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Serialize)]
struct TimelineDump<'a> {
    config: DumpConfig,
    report: &'a RunReport,
    timeline: &'a [TimelineEvent],
    final_state: TreeSnapshot,
}

#[derive(Serialize)]
struct DumpConfig {
    nodes: usize,
    seed: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canopy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Positional args override the environment
    let args: Vec<String> = env::args().collect();
    let mut config = SimulationConfig::from_env();
    if let Some(nodes) = args.get(1).and_then(|s| s.parse().ok()) {
        config = config.with_nodes(nodes);
    }
    if let Some(seed) = args.get(2).and_then(|s| s.parse().ok()) {
        config = config.with_seed(seed);
    }
    let timeline_path = args.get(3);

    println!("Canopy distributed MST");
    println!("======================");
    println!();
    println!(
        "Generating {} nodes (seed {}, max degree {})...",
        config.node_count, config.seed, config.max_degree
    );

    let mut sim = Simulation::from_config(&config)?;
    println!("  Links: {}", sim.graph().link_count());
    println!("  Round limit: {}", sim.round_limit());
    println!();

    let report = sim.run_until_converged()?;

    println!("Converged after {} rounds:", report.rounds);
    println!("  Messages delivered: {}", report.messages);
    for (kind, count) in sim.metrics().by_kind() {
        println!("    {:<18} {}", kind.to_string(), count);
    }
    println!("  MWOE exchange (round 1): {}", sim.metrics().in_round(1));
    if let Some((round, count)) = sim.metrics().peak_round() {
        println!("  Busiest round: {} ({} messages)", round, count);
    }
    println!(
        "  Connects sent: {}",
        sim.metrics().count(MessageKind::Connect)
    );
    println!();
    println!("Tree weight:      {}", report.tree_weight);
    println!("Reference MST:    {}", report.mst_weight);
    println!("Total link weight: {}", report.graph_weight);
    if report.is_minimal() {
        println!("Distributed tree matches the reference MST.");
    } else {
        tracing::error!(
            tree_weight = report.tree_weight,
            mst_weight = report.mst_weight,
            "distributed tree is not minimal"
        );
    }

    if let Some(path) = timeline_path {
        let dump = TimelineDump {
            config: DumpConfig {
                nodes: config.node_count,
                seed: config.seed,
            },
            report: &report,
            timeline: sim.timeline(),
            final_state: sim.snapshot(),
        };
        serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), &dump)?;
        println!();
        println!("Timeline ({} events) written to {}", sim.timeline().len(), path);
    }

    if report.is_minimal() {
        Ok(())
    } else {
        Err("distributed tree is not minimal".into())
    }
}
