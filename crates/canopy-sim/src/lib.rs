//! Canopy Simulation
//!
//! The round driver around the protocol engine: it owns the graph, runs
//! every node's hooks in lock-step, delivers messages only across existing
//! links, and records what happened.
//!
//! # Architecture
//!
//! - **Simulation**: one [`GhsNode`](canopy_ghs::GhsNode) per graph node,
//!   stepped round by round
//! - **Timeline**: node events stamped with their global round
//! - **Snapshots**: node views and tree links at a round boundary
//! - **Verify**: fragment invariants and tree weight
//!
//! # Usage
//!
//! ```ignore
//! let mut sim = Simulation::from_config(&SimulationConfig::default().with_nodes(50))?;
//! let report = sim.run_until_converged()?;
//! assert!(report.is_minimal());
//! ```

mod config;
mod error;
mod events;
mod metrics;
mod simulation;
pub mod verify;

pub use config::SimulationConfig;
pub use error::{Result, SimError};
pub use events::{TimelineEvent, TreeLink, TreeSnapshot};
pub use metrics::MessageMetrics;
pub use simulation::{RunReport, Simulation};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_runs_to_mst() {
        let mut sim = Simulation::from_config(&SimulationConfig::default()).unwrap();
        let report = sim.run_until_converged().unwrap();
        assert!(report.is_minimal());
        assert!(sim.all_converged());
        assert!(verify::check_fragments(&sim.views()).is_ok());
    }
}
