//! Error types for canopy-sim.

use canopy_ghs::ProtocolError;
use canopy_topology::{NodeId, TopologyError};
use thiserror::Error;

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors that abort a simulation run.
#[derive(Debug, Error)]
pub enum SimError {
    /// The graph is unusable for a protocol run.
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    /// A node detected a protocol violation.
    #[error("protocol violation at node {node}: {source}")]
    Protocol {
        node: NodeId,
        #[source]
        source: ProtocolError,
    },

    /// A message was addressed across a pair of nodes with no link.
    #[error("node {from} cannot send to non-neighbor {to}")]
    NotANeighbor { from: NodeId, to: NodeId },

    /// No node with this id takes part in the run.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// Not every node converged within the round limit.
    #[error("not converged after {rounds} rounds")]
    RoundLimit { rounds: u64 },
}
