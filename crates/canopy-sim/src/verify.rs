//! Structural checks over node views.
//!
//! Fragments are derived, not stored: the members of a fragment are the
//! nodes sharing a fragment id. At every cycle boundary each fragment must
//! have exactly one root, every member must name that root as leader and
//! reach it through parent links, and the root's size must count the
//! members.
//!
//! Only cycle boundaries are checked, where every node is announcing or
//! terminal. Mid-cycle a reroot is in flight for several rounds and the
//! candidate and the old root both have no parent.

use std::collections::BTreeMap;

use canopy_ghs::{FragmentId, NodeView};
use canopy_topology::{Graph, NodeId};
use thiserror::Error;

use crate::events::TreeLink;

/// A broken fragment invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("fragment {fragment} has {roots} roots")]
    RootCount { fragment: FragmentId, roots: usize },

    #[error("node {node} in fragment {fragment} names leader {leader}, root is {root}")]
    LeaderMismatch {
        node: NodeId,
        fragment: FragmentId,
        leader: NodeId,
        root: NodeId,
    },

    #[error("node {node} does not reach the root of fragment {fragment}")]
    Unrooted { node: NodeId, fragment: FragmentId },

    #[error("fragment {fragment} root reports size {reported}, fragment has {actual} members")]
    SizeMismatch {
        fragment: FragmentId,
        reported: usize,
        actual: usize,
    },
}

/// Check every fragment's root, leader agreement, tree shape and size.
pub fn check_fragments(nodes: &[NodeView]) -> Result<(), Violation> {
    let by_id: BTreeMap<NodeId, &NodeView> = nodes.iter().map(|view| (view.id, view)).collect();
    let mut fragments: BTreeMap<FragmentId, Vec<&NodeView>> = BTreeMap::new();
    for view in nodes {
        fragments.entry(view.fragment).or_default().push(view);
    }

    for (&fragment, members) in &fragments {
        let roots: Vec<&&NodeView> = members.iter().filter(|v| v.parent.is_none()).collect();
        let [root] = roots.as_slice() else {
            return Err(Violation::RootCount {
                fragment,
                roots: roots.len(),
            });
        };

        if root.fragment_size != members.len() {
            return Err(Violation::SizeMismatch {
                fragment,
                reported: root.fragment_size,
                actual: members.len(),
            });
        }

        for member in members {
            if member.leader != root.id {
                return Err(Violation::LeaderMismatch {
                    node: member.id,
                    fragment,
                    leader: member.leader,
                    root: root.id,
                });
            }
            if !reaches_root(member, root.id, members.len(), &by_id) {
                return Err(Violation::Unrooted {
                    node: member.id,
                    fragment,
                });
            }
        }
    }
    Ok(())
}

/// Follow parent links from `start` for at most `limit` hops, staying
/// inside `start`'s fragment.
fn reaches_root<'a>(
    start: &'a NodeView,
    root: NodeId,
    limit: usize,
    by_id: &BTreeMap<NodeId, &'a NodeView>,
) -> bool {
    let mut current = start;
    for _ in 0..limit {
        if current.id == root {
            return true;
        }
        match current.parent.and_then(|parent| by_id.get(&parent)) {
            Some(next) if next.fragment == start.fragment => current = *next,
            _ => return false,
        }
    }
    current.id == root
}

/// Parent links of the current forest with their graph weights. Links that
/// do not exist in the graph are skipped.
pub fn tree_links(graph: &Graph, nodes: &[NodeView]) -> Vec<TreeLink> {
    nodes
        .iter()
        .filter_map(|view| {
            let parent = view.parent?;
            let weight = graph.weight(view.id, parent)?;
            Some(TreeLink {
                child: view.id,
                parent,
                weight,
            })
        })
        .collect()
}

/// Total weight of the parent links.
pub fn tree_weight(graph: &Graph, nodes: &[NodeView]) -> u64 {
    tree_links(graph, nodes).iter().map(|link| link.weight).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_ghs::Phase;

    fn view(id: u64, fragment: u64, leader: u64, parent: Option<u64>, size: usize) -> NodeView {
        NodeView {
            id: NodeId(id),
            fragment: FragmentId(fragment),
            leader: NodeId(leader),
            parent: parent.map(NodeId),
            mwoe: None,
            fragment_size: size,
            phase: Phase::AnnounceFragment,
            round: 0,
            candidate: false,
        }
    }

    #[test]
    fn accepts_well_formed_fragments() {
        let nodes = [
            view(1, 3, 3, Some(2), 1),
            view(2, 3, 3, Some(3), 1),
            view(3, 3, 3, None, 3),
            view(4, 4, 4, None, 1),
        ];
        assert_eq!(check_fragments(&nodes), Ok(()));
    }

    #[test]
    fn rejects_two_roots() {
        let nodes = [view(1, 3, 3, None, 2), view(3, 3, 3, None, 2)];
        assert_eq!(
            check_fragments(&nodes),
            Err(Violation::RootCount {
                fragment: FragmentId(3),
                roots: 2
            })
        );
    }

    #[test]
    fn rejects_cycle() {
        let nodes = [
            view(1, 3, 3, Some(2), 0),
            view(2, 3, 3, Some(1), 0),
            view(3, 3, 3, None, 3),
        ];
        assert!(matches!(
            check_fragments(&nodes),
            Err(Violation::Unrooted { .. })
        ));
    }

    #[test]
    fn rejects_wrong_leader_and_size() {
        let nodes = [view(1, 2, 1, Some(2), 0), view(2, 2, 2, None, 2)];
        assert!(matches!(
            check_fragments(&nodes),
            Err(Violation::LeaderMismatch { .. })
        ));

        let nodes = [view(1, 2, 2, Some(2), 0), view(2, 2, 2, None, 3)];
        assert!(matches!(
            check_fragments(&nodes),
            Err(Violation::SizeMismatch { reported: 3, actual: 2, .. })
        ));
    }

    #[test]
    fn tree_weight_sums_parent_links() {
        let graph = Graph::from_links(&[(1, 2, 10), (2, 3, 5), (3, 4, 20), (1, 3, 15)]).unwrap();
        let nodes = [
            view(1, 4, 4, Some(2), 0),
            view(2, 4, 4, Some(3), 0),
            view(3, 4, 4, Some(4), 0),
            view(4, 4, 4, None, 4),
        ];
        assert_eq!(tree_links(&graph, &nodes).len(), 3);
        assert_eq!(tree_weight(&graph, &nodes), 35);
    }
}
