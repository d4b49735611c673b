//! Error types for canopy-ghs.
//!
//! Every variant is a protocol violation: under a correct topology and
//! correct peers none of them can occur, so the driver treats them as fatal
//! for the run. Stray cross-fragment broadcasts and absent MWOEs are
//! expected conditions and never surface here.

use canopy_topology::NodeId;
use thiserror::Error;

use crate::message::MessageKind;
use crate::phase::Phase;

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Protocol violations detected by a single node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A message was addressed to, or arrived from, a node that is not a
    /// direct neighbor.
    #[error("node {to} is not a neighbor of node {from}")]
    NotANeighbor { from: NodeId, to: NodeId },

    /// A message arrived in a phase that cannot produce it.
    #[error("node {node} received unexpected {kind} message in phase {phase}")]
    UnexpectedMessage {
        node: NodeId,
        phase: Phase,
        kind: MessageKind,
    },

    /// More than one direction switch reached the node in a single round.
    #[error("node {node} received more than one direction switch in round {round}")]
    MultipleSwitches { node: NodeId, round: u64 },

    /// A response ran out of hops before reaching its originator.
    #[error("response for node {origin} ended at node {node}")]
    MisroutedResponse { node: NodeId, origin: NodeId },

    /// The operation is only valid once the node has converged.
    #[error("node {node} has not converged")]
    NotConverged { node: NodeId },
}
