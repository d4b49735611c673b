//! Seeded random topology generation.
//!
//! Nodes are scattered over the unit square and linked to their nearest
//! peers, with both endpoints of every nearest-peer link bounded by
//! `max_degree`. Components left over afterwards are stitched together with
//! their closest cross-component pair, so the result is always connected.
//! Weights are drawn uniformly from `1..=max_weight` and never repeat.

use std::collections::{BTreeSet, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Result, TopologyError};
use crate::graph::Graph;
use crate::link::{NodeId, Weight};

/// Nearest-peer links per node.
pub const DEFAULT_MAX_DEGREE: usize = 7;

/// Upper bound for drawn link weights.
pub const DEFAULT_MAX_WEIGHT: Weight = 1_000_000_000;

/// Parameters for [`generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Number of nodes; ids are `1..=node_count`
    pub node_count: usize,
    /// Degree bound for nearest-peer links (stitching links may exceed it)
    pub max_degree: usize,
    /// Largest weight that can be drawn
    pub max_weight: Weight,
    /// Seed for deterministic generation
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            node_count: 10,
            max_degree: DEFAULT_MAX_DEGREE,
            max_weight: DEFAULT_MAX_WEIGHT,
            seed: 42,
        }
    }
}

impl GeneratorConfig {
    /// Config for `node_count` nodes with default degree and weights.
    #[must_use]
    pub fn with_nodes(node_count: usize) -> Self {
        Self {
            node_count,
            ..Default::default()
        }
    }

    /// Set the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the nearest-peer degree bound.
    #[must_use]
    pub fn with_max_degree(mut self, max_degree: usize) -> Self {
        self.max_degree = max_degree;
        self
    }

    /// Set the largest drawable weight.
    #[must_use]
    pub fn with_max_weight(mut self, max_weight: Weight) -> Self {
        self.max_weight = max_weight;
        self
    }

    /// Most links the generator can place: nearest-peer links plus at most
    /// `node_count - 1` stitching links.
    fn link_budget(&self) -> u64 {
        let n = self.node_count as u64;
        n * self.max_degree as u64 / 2 + n.saturating_sub(1)
    }

    fn check(&self) -> Result<()> {
        if self.node_count == 0 {
            return Err(TopologyError::InvalidConfig("node_count must be positive".into()));
        }
        if self.node_count > 1 && self.max_degree == 0 {
            return Err(TopologyError::InvalidConfig("max_degree must be positive".into()));
        }
        if self.max_weight < self.link_budget() {
            return Err(TopologyError::InvalidConfig(format!(
                "max_weight {} cannot hold {} distinct weights",
                self.max_weight,
                self.link_budget()
            )));
        }
        Ok(())
    }
}

struct Draft {
    positions: Vec<(f64, f64)>,
    degree: Vec<usize>,
    links: Vec<(usize, usize)>,
    linked: HashSet<(usize, usize)>,
}

impl Draft {
    fn distance(&self, i: usize, j: usize) -> f64 {
        let (xi, yi) = self.positions[i];
        let (xj, yj) = self.positions[j];
        ((xi - xj).powi(2) + (yi - yj).powi(2)).sqrt()
    }

    fn is_linked(&self, i: usize, j: usize) -> bool {
        self.linked.contains(&(i.min(j), i.max(j)))
    }

    fn link(&mut self, i: usize, j: usize) {
        self.linked.insert((i.min(j), i.max(j)));
        self.links.push((i, j));
        self.degree[i] += 1;
        self.degree[j] += 1;
    }

    /// Indices reachable from node 0.
    fn component_of_first(&self) -> BTreeSet<usize> {
        let mut seen = BTreeSet::from([0]);
        let mut stack = vec![0];
        while let Some(current) = stack.pop() {
            for &(a, b) in &self.links {
                let next = if a == current {
                    b
                } else if b == current {
                    a
                } else {
                    continue;
                };
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        seen
    }
}

/// Generate a connected graph with distinct positive weights.
pub fn generate(config: &GeneratorConfig) -> Result<Graph> {
    config.check()?;

    let n = config.node_count;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut draft = Draft {
        positions: (0..n).map(|_| (rng.gen::<f64>(), rng.gen::<f64>())).collect(),
        degree: vec![0; n],
        links: Vec::new(),
        linked: HashSet::new(),
    };

    // Nearest peers first
    for i in 0..n {
        let mut others: Vec<usize> = (0..n).filter(|&j| j != i).collect();
        others.sort_by(|&a, &b| draft.distance(i, a).total_cmp(&draft.distance(i, b)));

        for j in others {
            if draft.degree[i] >= config.max_degree {
                break;
            }
            if draft.is_linked(i, j) || draft.degree[j] >= config.max_degree {
                continue;
            }
            draft.link(i, j);
        }
    }

    // Stitch remaining components through their closest pair
    loop {
        let component = draft.component_of_first();
        if component.len() == n {
            break;
        }
        let mut closest: Option<(usize, usize)> = None;
        for &i in &component {
            for j in (0..n).filter(|j| !component.contains(j)) {
                let closer = match closest {
                    None => true,
                    Some((a, b)) => draft.distance(i, j) < draft.distance(a, b),
                };
                if closer {
                    closest = Some((i, j));
                }
            }
        }
        match closest {
            Some((i, j)) => draft.link(i, j),
            None => break,
        }
    }

    let mut graph = Graph::new();
    for i in 0..n {
        graph.add_node(NodeId(i as u64 + 1))?;
    }
    let mut used = HashSet::new();
    for &(i, j) in &draft.links {
        let weight = loop {
            let candidate = rng.gen_range(1..=config.max_weight);
            if used.insert(candidate) {
                break candidate;
            }
        };
        graph.add_link(NodeId(i as u64 + 1), NodeId(j as u64 + 1), weight)?;
    }

    Ok(graph)
}
