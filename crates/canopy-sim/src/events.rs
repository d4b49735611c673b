//! Timeline records and round-boundary snapshots.

use canopy_ghs::{NodeEvent, NodeView};
use canopy_topology::{NodeId, Weight};
use serde::{Deserialize, Serialize};

/// A node event stamped with the global round it happened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub round: u64,
    pub node: NodeId,
    pub event: NodeEvent,
}

/// One link of the current forest, oriented child to parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeLink {
    pub child: NodeId,
    pub parent: NodeId,
    pub weight: Weight,
}

/// State of every node at a round boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub round: u64,
    pub nodes: Vec<NodeView>,
    pub links: Vec<TreeLink>,
    pub fragment_count: usize,
    pub converged_count: usize,
    pub tree_weight: u64,
}

impl TreeSnapshot {
    /// Whether every node has converged.
    pub fn is_complete(&self) -> bool {
        !self.nodes.is_empty() && self.converged_count == self.nodes.len()
    }
}
