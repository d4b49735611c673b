//! Lock-step round driver with event recording.

use std::collections::BTreeMap;

use canopy_ghs::{GhsNode, NodeView, Outgoing, RoundContext, Schedule};
use canopy_topology::{generate, minimum_spanning_weight, Graph, NodeId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::error::{Result, SimError};
use crate::events::{TimelineEvent, TreeSnapshot};
use crate::metrics::MessageMetrics;
use crate::verify;

/// Outcome of a run to convergence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Global rounds executed
    pub rounds: u64,
    /// Messages delivered
    pub messages: u64,
    /// Weight of the tree the nodes built
    pub tree_weight: u64,
    /// Weight of the reference minimum spanning tree
    pub mst_weight: u64,
    /// Weight of every link in the graph
    pub graph_weight: u64,
}

impl RunReport {
    /// Whether the distributed tree matches the reference.
    pub fn is_minimal(&self) -> bool {
        self.tree_weight == self.mst_weight
    }
}

/// Drives every node through synchronous rounds.
///
/// Each [`step`](Simulation::step) runs all pre-round hooks, delivers the
/// messages sent during the previous round, runs all post-round hooks, and
/// collects the new outboxes. Link orientation is refreshed from the nodes'
/// parent pointers at every round boundary.
pub struct Simulation {
    graph: Graph,
    nodes: BTreeMap<NodeId, GhsNode>,
    in_flight: Vec<Outgoing>,
    round: u64,
    round_limit: u64,
    timeline: Vec<TimelineEvent>,
    metrics: MessageMetrics,
}

impl Simulation {
    /// Create a simulation over a connected graph.
    pub fn new(graph: Graph) -> Result<Self> {
        graph.validate()?;
        let nodes = graph
            .node_ids()
            .map(|id| (id, GhsNode::new(id, graph.neighbors(id))))
            .collect();
        let round_limit = Schedule::new(graph.node_count()).round_bound();

        Ok(Self {
            graph,
            nodes,
            in_flight: Vec::new(),
            round: 0,
            round_limit,
            timeline: Vec::new(),
            metrics: MessageMetrics::new(),
        })
    }

    /// Generate a topology from `config` and build a simulation over it.
    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        let graph = generate(&config.generator())?;
        let mut sim = Self::new(graph)?;
        if let Some(limit) = config.round_limit {
            sim.round_limit = limit;
        }
        Ok(sim)
    }

    /// Advance one global round.
    pub fn step(&mut self) -> Result<()> {
        let ctx = RoundContext {
            round: self.round,
            node_count: self.nodes.len(),
        };

        for (&id, node) in self.nodes.iter_mut() {
            node.on_round_start(&ctx)
                .map_err(|source| SimError::Protocol { node: id, source })?;
        }

        let deliveries = std::mem::take(&mut self.in_flight);
        let delivered = deliveries.len();
        for Outgoing { from, to, message } in deliveries {
            if !self.graph.are_neighbors(from, to) {
                return Err(SimError::NotANeighbor { from, to });
            }
            self.metrics.record(self.round, message.kind());
            let node = self.nodes.get_mut(&to).ok_or(SimError::UnknownNode(to))?;
            node.deliver(from, message)
                .map_err(|source| SimError::Protocol { node: to, source })?;
        }

        for (&id, node) in self.nodes.iter_mut() {
            node.on_round_end(&ctx)
                .map_err(|source| SimError::Protocol { node: id, source })?;
        }

        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        for id in ids {
            self.collect(id);
        }
        self.sync_orientation();

        debug!(round = self.round, delivered, in_flight = self.in_flight.len(), "round complete");
        self.round += 1;
        Ok(())
    }

    /// Advance `rounds` global rounds.
    pub fn run_rounds(&mut self, rounds: u64) -> Result<()> {
        for _ in 0..rounds {
            self.step()?;
        }
        Ok(())
    }

    /// Run until every node reports convergence, or fail at the round limit.
    pub fn run_until_converged(&mut self) -> Result<RunReport> {
        while !self.all_converged() {
            if self.round >= self.round_limit {
                return Err(SimError::RoundLimit { rounds: self.round });
            }
            self.step()?;
        }

        let report = self.report();
        info!(
            rounds = report.rounds,
            messages = report.messages,
            tree_weight = report.tree_weight,
            mst_weight = report.mst_weight,
            "all nodes converged"
        );
        Ok(report)
    }

    /// Run until no message is in flight. Used after convergence to let
    /// requests and sink changes settle.
    pub fn run_until_quiet(&mut self) -> Result<u64> {
        // A request and its response each cross at most N - 1 links
        let budget = 2 * self.nodes.len() as u64 + 2;
        let start = self.round;
        while !self.in_flight.is_empty() {
            if self.round - start >= budget {
                return Err(SimError::RoundLimit { rounds: self.round });
            }
            self.step()?;
        }
        Ok(self.round - start)
    }

    pub fn all_converged(&self) -> bool {
        self.nodes.values().all(GhsNode::is_converged)
    }

    pub fn converged_count(&self) -> usize {
        self.nodes.values().filter(|node| node.is_converged()).count()
    }

    pub fn node(&self, id: NodeId) -> Option<&GhsNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GhsNode> {
        self.nodes.values()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Global rounds executed so far.
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn round_limit(&self) -> u64 {
        self.round_limit
    }

    pub fn timeline(&self) -> &[TimelineEvent] {
        &self.timeline
    }

    pub fn metrics(&self) -> &MessageMetrics {
        &self.metrics
    }

    pub fn views(&self) -> Vec<NodeView> {
        self.nodes.values().map(GhsNode::view).collect()
    }

    /// Weight of the forest currently encoded by parent pointers.
    pub fn tree_weight(&self) -> u64 {
        verify::tree_weight(&self.graph, &self.views())
    }

    /// State of every node at the current round boundary.
    pub fn snapshot(&self) -> TreeSnapshot {
        let nodes = self.views();
        let links = verify::tree_links(&self.graph, &nodes);
        let fragment_count = nodes.iter().filter(|view| view.parent.is_none()).count();
        let tree_weight = links.iter().map(|link| link.weight).sum();

        TreeSnapshot {
            round: self.round,
            converged_count: self.converged_count(),
            fragment_count,
            tree_weight,
            links,
            nodes,
        }
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            rounds: self.round,
            messages: self.metrics.total(),
            tree_weight: self.tree_weight(),
            mst_weight: minimum_spanning_weight(&self.graph),
            graph_weight: self.graph.total_weight(),
        }
    }

    /// Make `id` the request sink by rerooting the final tree at it.
    pub fn designate_sink(&mut self, id: NodeId) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(SimError::UnknownNode(id))?;
        node.become_sink()
            .map_err(|source| SimError::Protocol { node: id, source })?;
        info!(node = %id, "designated request sink");
        self.collect(id);
        Ok(())
    }

    /// Originate a request at `id`; it travels on the next rounds.
    pub fn submit_request(&mut self, id: NodeId, text: impl Into<String>) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(SimError::UnknownNode(id))?;
        node.submit_request(text)
            .map_err(|source| SimError::Protocol { node: id, source })?;
        self.collect(id);
        Ok(())
    }

    /// Move a node's outbox into flight and its events into the timeline.
    fn collect(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        self.in_flight.extend(node.take_outbox());
        let round = self.round;
        self.timeline.extend(
            node.take_events()
                .into_iter()
                .map(|event| TimelineEvent { round, node: id, event }),
        );
    }

    fn sync_orientation(&mut self) {
        self.graph.clear_orientation();
        let parents: Vec<(NodeId, NodeId)> = self
            .nodes
            .values()
            .filter_map(|node| node.parent().map(|parent| (node.id(), parent)))
            .collect();
        for (child, parent) in parents {
            if let Some(link) = self.graph.link_mut(child, parent) {
                // Only endpoints are rejected, and parent always is one
                let _ = link.set_orientation(Some(parent));
            }
        }
    }
}
