//! Canopy GHS
//!
//! A synchronous Gallager–Humblet–Spira style minimum spanning tree
//! protocol. Every node runs the same [`GhsNode`] state machine, talks only
//! to direct neighbors, and derives its phase from its own round counter and
//! the node count.
//!
//! # Cycle
//!
//! After a one-off round in which mutual MWOE pairs merge, every cycle:
//!
//! 1. announces fragment ids to neighbors and recomputes each node's MWOE,
//! 2. convergecasts MWOE weights to the fragment root, which broadcasts the
//!    minimum back,
//! 3. reroots the fragment at the member owning that minimum,
//! 4. sends `Connect` across it and merges the pairs of fragments that chose
//!    each other,
//! 5. stops once the fragment size equals the node count.
//!
//! Each cycle merges at least the pair sharing the globally lightest
//! inter-fragment edge, and only ever adds fragment MWOEs, so the result is
//! the unique minimum spanning tree within [`Schedule::round_bound`] rounds.
//!
//! # Driving
//!
//! The engine has no transport. A driver (see `canopy-sim`) calls
//! [`GhsNode::on_round_start`], [`GhsNode::deliver`] and
//! [`GhsNode::on_round_end`] in lock-step and moves [`Outgoing`] messages
//! between nodes.

mod error;
mod event;
mod flood;
mod message;
mod node;
mod phase;

pub use error::{ProtocolError, Result};
pub use event::NodeEvent;
pub use flood::FloodState;
pub use message::{
    BroadcastEnvelope, ConvergecastEnvelope, FragmentId, Message, MessageKind, Notice, Request,
    Response, Upcast,
};
pub use node::{GhsNode, Mwoe, NodeView, Outgoing, RoundContext, ServedRequest};
pub use phase::{Phase, Schedule};
