//! The closed protocol message set.
//!
//! Every message is a small immutable value. Fragment-scoped payloads travel
//! inside a [`BroadcastEnvelope`]; payloads bound for the fragment root travel
//! inside a [`ConvergecastEnvelope`]. Everything else goes to one direct
//! neighbor.

use std::fmt;

use canopy_topology::{NodeId, Weight};
use serde::{Deserialize, Serialize};

/// Fragment identifier. Always the id of some node that led the fragment
/// when it was formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FragmentId(pub u64);

impl From<NodeId> for FragmentId {
    fn from(id: NodeId) -> Self {
        Self(id.value())
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.0)
    }
}

/// A protocol message exchanged between direct neighbors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Round-0 announcement of the sender's local MWOE weight
    Mwoe { weight: Weight },

    /// The sender's current fragment id (neighbors only, no flooding)
    FragmentAnnounce { fragment: FragmentId },

    /// Fragment-scoped flood
    Broadcast(BroadcastEnvelope),

    /// Hop toward the fragment root
    Convergecast(ConvergecastEnvelope),

    /// Request to merge across the sender's fragment MWOE
    Connect { fragment: FragmentId, size: usize },

    /// Reply to a routed request, walking the path stack back
    Response(Response),
}

impl Message {
    /// The message kind, for metrics and logs.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Mwoe { .. } => MessageKind::Mwoe,
            Message::FragmentAnnounce { .. } => MessageKind::FragmentAnnounce,
            Message::Broadcast(_) => MessageKind::Broadcast,
            Message::Convergecast(_) => MessageKind::Convergecast,
            Message::Connect { .. } => MessageKind::Connect,
            Message::Response(_) => MessageKind::Response,
        }
    }
}

/// Message discriminant without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Mwoe,
    FragmentAnnounce,
    Broadcast,
    Convergecast,
    Connect,
    Response,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mwoe => "mwoe",
            Self::FragmentAnnounce => "fragment-announce",
            Self::Broadcast => "broadcast",
            Self::Convergecast => "convergecast",
            Self::Connect => "connect",
            Self::Response => "response",
        };
        f.write_str(name)
    }
}

/// A flood confined to one fragment.
///
/// `(origin, sequence)` identifies the broadcast; `fragment` is the
/// originator's fragment id at send time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastEnvelope {
    pub origin: NodeId,
    pub fragment: FragmentId,
    pub sequence: u64,
    pub notice: Notice,
}

/// Payloads that every fragment member must see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    /// The fragment-wide minimum outgoing weight
    Mwoe { weight: Weight },

    /// The fragment merged; adopt these values verbatim
    FragmentChanged {
        leader: NodeId,
        fragment: FragmentId,
        size: usize,
    },

    /// The fragment was rerooted at `leader`
    NewLeader { leader: NodeId },
}

/// A payload on its way to the fragment root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergecastEnvelope {
    /// Node that started the convergecast
    pub origin: NodeId,
    pub payload: Upcast,
}

/// Payloads carried toward the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Upcast {
    /// A member's local MWOE weight
    Mwoe { weight: Weight },

    /// Reverse each parent link on the way to the old root
    SwitchDirection { new_leader: NodeId },

    /// Application request for the sink
    Request(Request),
}

/// Application request routed to the sink along the final tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub text: String,
    /// Ids of every node that forwarded the request, originator first
    pub path: Vec<NodeId>,
}

/// Sink reply, delivered hop by hop by popping the path stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// The request originator
    pub origin: NodeId,
    pub sink: NodeId,
    pub text: String,
    /// Remaining hops; empty once the reply reaches the originator
    pub path: Vec<NodeId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_variants() {
        let broadcast = Message::Broadcast(BroadcastEnvelope {
            origin: NodeId(1),
            fragment: FragmentId(1),
            sequence: 0,
            notice: Notice::NewLeader { leader: NodeId(1) },
        });
        assert_eq!(broadcast.kind(), MessageKind::Broadcast);
        assert_eq!(Message::Mwoe { weight: 3 }.kind(), MessageKind::Mwoe);
        assert_eq!(MessageKind::FragmentAnnounce.to_string(), "fragment-announce");
    }

    #[test]
    fn fragment_id_from_node() {
        assert_eq!(FragmentId::from(NodeId(9)), FragmentId(9));
        assert_eq!(FragmentId(9).to_string(), "F9");
    }
}
