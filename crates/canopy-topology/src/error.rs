//! Error types for canopy-topology.

use thiserror::Error;

use crate::link::{NodeId, Weight};

/// Result type for topology operations.
pub type Result<T> = std::result::Result<T, TopologyError>;

/// Errors raised while building or validating a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// A node with this id is already registered.
    #[error("node {0} already exists")]
    DuplicateNode(NodeId),

    /// A link references a node that is not registered.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// Both endpoints of a link are the same node.
    #[error("self-loop on node {0}")]
    SelfLoop(NodeId),

    /// The two nodes are already linked.
    #[error("nodes {a} and {b} are already linked")]
    DuplicateLink { a: NodeId, b: NodeId },

    /// Weights must be positive.
    #[error("link {a}-{b} has zero weight")]
    ZeroWeight { a: NodeId, b: NodeId },

    /// Weights must be globally distinct.
    #[error("weight {weight} is already used by another link")]
    DuplicateWeight { weight: Weight },

    /// Orientation may only point at one of the link's endpoints.
    #[error("node {node} is not an endpoint of link {a}-{b}")]
    NotAnEndpoint { node: NodeId, a: NodeId, b: NodeId },

    /// A protocol run needs at least one node.
    #[error("graph has no nodes")]
    Empty,

    /// A protocol run needs a connected graph.
    #[error("graph is disconnected: {reachable} of {total} nodes reachable")]
    Disconnected { reachable: usize, total: usize },

    /// Generator parameters cannot produce a valid graph.
    #[error("invalid generator config: {0}")]
    InvalidConfig(String),
}
