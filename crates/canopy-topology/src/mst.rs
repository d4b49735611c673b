//! Reference minimum spanning tree (Kruskal).
//!
//! Centralized and sequential. Distributed runs are checked against it.

use std::collections::HashMap;

use crate::graph::Graph;
use crate::link::{Link, NodeId};

/// Disjoint-set forest over node ids.
struct UnionFind {
    parent: HashMap<NodeId, NodeId>,
    rank: HashMap<NodeId, u32>,
}

impl UnionFind {
    fn new(nodes: impl Iterator<Item = NodeId>) -> Self {
        let parent: HashMap<_, _> = nodes.map(|id| (id, id)).collect();
        let rank = parent.keys().map(|&id| (id, 0)).collect();
        Self { parent, rank }
    }

    fn find(&mut self, id: NodeId) -> NodeId {
        let mut root = id;
        while self.parent[&root] != root {
            root = self.parent[&root];
        }
        // Path compression
        let mut current = id;
        while current != root {
            let next = self.parent[&current];
            self.parent.insert(current, root);
            current = next;
        }
        root
    }

    /// Join the sets of `a` and `b`. Returns false if they were already joined.
    fn union(&mut self, a: NodeId, b: NodeId) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        let (rank_a, rank_b) = (self.rank[&ra], self.rank[&rb]);
        if rank_a < rank_b {
            self.parent.insert(ra, rb);
        } else if rank_a > rank_b {
            self.parent.insert(rb, ra);
        } else {
            self.parent.insert(rb, ra);
            self.rank.insert(ra, rank_a + 1);
        }
        true
    }
}

/// Links of the minimum spanning forest, in ascending weight order.
///
/// For a connected graph this is the unique MST (weights are distinct).
pub fn kruskal(graph: &Graph) -> Vec<Link> {
    let mut sorted: Vec<&Link> = graph.links().iter().collect();
    sorted.sort_by_key(|link| link.weight());

    let mut sets = UnionFind::new(graph.node_ids());
    sorted
        .into_iter()
        .filter(|link| {
            let (a, b) = link.endpoints();
            sets.union(a, b)
        })
        .cloned()
        .collect()
}

/// Total weight of the minimum spanning forest.
pub fn minimum_spanning_weight(graph: &Graph) -> u64 {
    kruskal(graph).iter().map(Link::weight).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_has_n_minus_one_links() {
        let graph = Graph::from_links(&[
            (1, 2, 7),
            (1, 3, 3),
            (2, 3, 9),
            (2, 4, 2),
            (3, 4, 8),
            (4, 5, 6),
            (3, 5, 1),
        ])
        .unwrap();

        let tree = kruskal(&graph);
        assert_eq!(tree.len(), graph.node_count() - 1);
        let weights: Vec<_> = tree.iter().map(Link::weight).collect();
        assert_eq!(weights, vec![1, 2, 3, 6]);
        assert_eq!(minimum_spanning_weight(&graph), 12);
    }

    #[test]
    fn single_node_has_empty_tree() {
        let mut graph = Graph::new();
        graph.add_node(NodeId(1)).unwrap();
        assert!(kruskal(&graph).is_empty());
        assert_eq!(minimum_spanning_weight(&graph), 0);
    }

    #[test]
    fn disconnected_graph_yields_forest() {
        let mut graph = Graph::from_links(&[(1, 2, 5), (3, 4, 6)]).unwrap();
        graph.add_node(NodeId(5)).unwrap();
        assert_eq!(kruskal(&graph).len(), 2);
    }
}
