//! Node identity and weighted links.

use std::fmt;

use crate::error::{Result, TopologyError};

/// Link weight. Positive and globally distinct within a graph.
pub type Weight = u64;

/// A globally unique, totally ordered node identifier.
///
/// The id is the only tie-break key the protocol uses, and a node's initial
/// fragment id is its own id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u64);

impl NodeId {
    /// Raw id value.
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// An undirected weighted link between two nodes.
///
/// Endpoints are stored in ascending order. The weight is fixed at
/// construction; `orientation` is the endpoint the spanning tree currently
/// points toward (the child's parent), or `None` when the link is not a tree
/// link.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Link {
    a: NodeId,
    b: NodeId,
    weight: Weight,
    orientation: Option<NodeId>,
}

impl Link {
    /// Create a link. Endpoints are normalized so that `a < b`.
    pub fn new(a: NodeId, b: NodeId, weight: Weight) -> Result<Self> {
        if a == b {
            return Err(TopologyError::SelfLoop(a));
        }
        if weight == 0 {
            return Err(TopologyError::ZeroWeight { a, b });
        }
        let (a, b) = if a < b { (a, b) } else { (b, a) };
        Ok(Self {
            a,
            b,
            weight,
            orientation: None,
        })
    }

    /// Both endpoints, lower id first.
    pub fn endpoints(&self) -> (NodeId, NodeId) {
        (self.a, self.b)
    }

    /// The link weight.
    pub fn weight(&self) -> Weight {
        self.weight
    }

    /// Whether `node` is one of the endpoints.
    pub fn touches(&self, node: NodeId) -> bool {
        self.a == node || self.b == node
    }

    /// The endpoint opposite `from`, if `from` is an endpoint.
    pub fn other(&self, from: NodeId) -> Option<NodeId> {
        if from == self.a {
            Some(self.b)
        } else if from == self.b {
            Some(self.a)
        } else {
            None
        }
    }

    /// The endpoint the tree points toward, if this is a tree link.
    pub fn orientation(&self) -> Option<NodeId> {
        self.orientation
    }

    /// Point the link toward one of its endpoints, or clear it.
    pub fn set_orientation(&mut self, toward: Option<NodeId>) -> Result<()> {
        if let Some(node) = toward {
            if !self.touches(node) {
                return Err(TopologyError::NotAnEndpoint {
                    node,
                    a: self.a,
                    b: self.b,
                });
            }
        }
        self.orientation = toward;
        Ok(())
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} ({})", self.a, self.b, self.weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_normalized() {
        let link = Link::new(NodeId(7), NodeId(3), 12).unwrap();
        assert_eq!(link.endpoints(), (NodeId(3), NodeId(7)));
        assert_eq!(link.other(NodeId(3)), Some(NodeId(7)));
        assert_eq!(link.other(NodeId(7)), Some(NodeId(3)));
        assert_eq!(link.other(NodeId(1)), None);
    }

    #[test]
    fn rejects_self_loop_and_zero_weight() {
        assert_eq!(
            Link::new(NodeId(1), NodeId(1), 5),
            Err(TopologyError::SelfLoop(NodeId(1)))
        );
        assert!(matches!(
            Link::new(NodeId(1), NodeId(2), 0),
            Err(TopologyError::ZeroWeight { .. })
        ));
    }

    #[test]
    fn orientation_only_points_at_endpoints() {
        let mut link = Link::new(NodeId(1), NodeId(2), 4).unwrap();
        assert_eq!(link.orientation(), None);

        link.set_orientation(Some(NodeId(2))).unwrap();
        assert_eq!(link.orientation(), Some(NodeId(2)));

        assert!(link.set_orientation(Some(NodeId(9))).is_err());
        assert_eq!(link.orientation(), Some(NodeId(2)));

        link.set_orientation(None).unwrap();
        assert_eq!(link.orientation(), None);
    }
}
