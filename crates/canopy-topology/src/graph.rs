//! Node and link registry.
//!
//! Nodes never own each other. Every cross-node reference in the protocol is
//! a [`NodeId`] resolved through this registry.

use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::error::{Result, TopologyError};
use crate::link::{Link, NodeId, Weight};

/// A direct neighbor as seen from one endpoint of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Neighbor {
    /// The node at the far end of the link
    pub id: NodeId,
    /// Weight of the connecting link
    pub weight: Weight,
}

/// A fixed undirected weighted graph with distinct link weights.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Incident link indices per node, in insertion order
    incidence: BTreeMap<NodeId, Vec<usize>>,
    links: Vec<Link>,
    weights: HashSet<Weight>,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from `(a, b, weight)` triples, registering nodes as they
    /// appear.
    pub fn from_links(triples: &[(u64, u64, Weight)]) -> Result<Self> {
        let mut graph = Self::new();
        for &(a, b, weight) in triples {
            for id in [NodeId(a), NodeId(b)] {
                if !graph.contains(id) {
                    graph.add_node(id)?;
                }
            }
            graph.add_link(NodeId(a), NodeId(b), weight)?;
        }
        Ok(graph)
    }

    /// Register a node.
    pub fn add_node(&mut self, id: NodeId) -> Result<()> {
        if self.incidence.contains_key(&id) {
            return Err(TopologyError::DuplicateNode(id));
        }
        self.incidence.insert(id, Vec::new());
        Ok(())
    }

    /// Link two registered nodes with a positive weight not used elsewhere.
    pub fn add_link(&mut self, a: NodeId, b: NodeId, weight: Weight) -> Result<()> {
        let link = Link::new(a, b, weight)?;
        for id in [a, b] {
            if !self.contains(id) {
                return Err(TopologyError::UnknownNode(id));
            }
        }
        if self.are_neighbors(a, b) {
            return Err(TopologyError::DuplicateLink { a, b });
        }
        if !self.weights.insert(weight) {
            return Err(TopologyError::DuplicateWeight { weight });
        }

        let index = self.links.len();
        self.links.push(link);
        for id in [a, b] {
            if let Some(incident) = self.incidence.get_mut(&id) {
                incident.push(index);
            }
        }
        Ok(())
    }

    /// Whether the node is registered.
    pub fn contains(&self, id: NodeId) -> bool {
        self.incidence.contains_key(&id)
    }

    /// All node ids in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.incidence.keys().copied()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.incidence.len()
    }

    /// Number of links.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// All links in insertion order.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// The link between two nodes, if they are neighbors.
    pub fn link(&self, a: NodeId, b: NodeId) -> Option<&Link> {
        self.link_index(a, b).map(|i| &self.links[i])
    }

    /// Mutable access to the link between two nodes (orientation only; the
    /// weight has no setter).
    pub fn link_mut(&mut self, a: NodeId, b: NodeId) -> Option<&mut Link> {
        self.link_index(a, b).map(move |i| &mut self.links[i])
    }

    fn link_index(&self, a: NodeId, b: NodeId) -> Option<usize> {
        self.incidence
            .get(&a)?
            .iter()
            .copied()
            .find(|&i| self.links[i].other(a) == Some(b))
    }

    /// Direct neighbors of a node with the weight of each connecting link.
    pub fn neighbors(&self, id: NodeId) -> Vec<Neighbor> {
        self.incidence
            .get(&id)
            .map(|incident| {
                incident
                    .iter()
                    .filter_map(|&i| {
                        let link = &self.links[i];
                        link.other(id).map(|other| Neighbor {
                            id: other,
                            weight: link.weight(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Weight of the link between two nodes.
    pub fn weight(&self, a: NodeId, b: NodeId) -> Option<Weight> {
        self.link(a, b).map(Link::weight)
    }

    /// Whether two nodes share a link.
    pub fn are_neighbors(&self, a: NodeId, b: NodeId) -> bool {
        self.link_index(a, b).is_some()
    }

    /// Sum of all link weights.
    pub fn total_weight(&self) -> u64 {
        self.links.iter().map(Link::weight).sum()
    }

    /// Number of nodes reachable from the lowest id.
    fn reachable_count(&self) -> usize {
        let Some(start) = self.node_ids().next() else {
            return 0;
        };

        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for neighbor in self.neighbors(current) {
                if seen.insert(neighbor.id) {
                    queue.push_back(neighbor.id);
                }
            }
        }
        seen.len()
    }

    /// Whether every node is reachable from every other.
    pub fn is_connected(&self) -> bool {
        self.reachable_count() == self.node_count()
    }

    /// Check that the graph can host a protocol run: non-empty and connected.
    ///
    /// Weight distinctness and positivity are enforced on insertion.
    pub fn validate(&self) -> Result<()> {
        if self.incidence.is_empty() {
            return Err(TopologyError::Empty);
        }
        let reachable = self.reachable_count();
        if reachable != self.node_count() {
            return Err(TopologyError::Disconnected {
                reachable,
                total: self.node_count(),
            });
        }
        Ok(())
    }

    /// Clear the orientation of every link.
    pub fn clear_orientation(&mut self) {
        for link in &mut self.links {
            // None is always a valid orientation
            let _ = link.set_orientation(None);
        }
    }
}
