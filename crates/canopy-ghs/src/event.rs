//! Per-node protocol events, drained by the driver into its timeline.

use canopy_topology::{NodeId, Weight};
use serde::{Deserialize, Serialize};

use crate::message::FragmentId;
use crate::phase::Phase;

/// Something notable a node did during a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeEvent {
    /// The node entered a new phase
    PhaseEntered { phase: Phase },

    /// The node merged its fragment with `peer`'s across their shared edge
    Merged {
        peer: NodeId,
        leader: NodeId,
        fragment: FragmentId,
        size: usize,
    },

    /// The node became its fragment's root
    Rerooted { previous_parent: Option<NodeId> },

    /// The node's local MWOE matched the fragment minimum
    Candidate { weight: Weight },

    /// The whole graph is one fragment
    Converged { leader: NodeId, size: usize },

    /// A broadcast tagged with another fragment id was dropped
    StaleBroadcastDropped {
        origin: NodeId,
        fragment: FragmentId,
    },

    /// This node, as sink, answered a request
    RequestServed { origin: NodeId, hops: usize },

    /// A response reached this node, its originator
    ResponseDelivered { sink: NodeId },
}
