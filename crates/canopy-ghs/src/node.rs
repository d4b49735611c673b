//! The node protocol engine.
//!
//! A [`GhsNode`] owns all of one node's protocol state and only ever learns
//! about other nodes through messages. The driver calls, once per global
//! round:
//!
//! 1. [`GhsNode::on_round_start`] on every node (phase entry actions),
//! 2. [`GhsNode::deliver`] for every message sent in the previous round,
//! 3. [`GhsNode::on_round_end`] on every node (consume inbox, forward),
//!
//! and then collects every node's [`GhsNode::take_outbox`] for delivery in
//! the next round. A message therefore costs one round per hop.
//!
//! # Fragments
//!
//! A fragment is the set of nodes sharing a [`FragmentId`]. Its tree is
//! encoded by `parent` pointers; the single member with no parent is the
//! root and its id is every member's `leader`.
//!
//! Each node keeps the last fragment id announced by each neighbor. The
//! table decides which edges are outgoing (MWOE candidates) and which edges
//! carry fragment-scoped broadcasts.

use std::collections::BTreeMap;

use canopy_topology::{Neighbor, NodeId, Weight};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::error::{ProtocolError, Result};
use crate::event::NodeEvent;
use crate::flood::FloodState;
use crate::message::{
    BroadcastEnvelope, ConvergecastEnvelope, FragmentId, Message, MessageKind, Notice, Request,
    Response, Upcast,
};
use crate::phase::{Phase, Schedule};

/// Per-round facts the driver hands to every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundContext {
    /// Global round index (for logging; nodes keep their own counter)
    pub round: u64,
    /// Total node count `N`
    pub node_count: usize,
}

/// A message queued for delivery to a direct neighbor next round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub from: NodeId,
    pub to: NodeId,
    pub message: Message,
}

/// The locally incident edge judged to be the minimum-weight edge into a
/// different fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mwoe {
    pub neighbor: NodeId,
    pub weight: Weight,
}

/// A request this node answered as sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServedRequest {
    pub origin: NodeId,
    pub text: String,
    /// Forwarding path as received, originator first
    pub path: Vec<NodeId>,
}

/// Read-only snapshot of a node's protocol state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeView {
    pub id: NodeId,
    pub fragment: FragmentId,
    pub leader: NodeId,
    pub parent: Option<NodeId>,
    pub mwoe: Option<Mwoe>,
    pub fragment_size: usize,
    pub phase: Phase,
    pub round: u64,
    pub candidate: bool,
}

/// One node's GHS state machine.
#[derive(Debug, Clone)]
pub struct GhsNode {
    id: NodeId,
    neighbors: BTreeMap<NodeId, Weight>,
    neighbor_fragments: BTreeMap<NodeId, FragmentId>,

    fragment: FragmentId,
    leader: NodeId,
    parent: Option<NodeId>,
    mwoe: Option<Mwoe>,
    fragment_size: usize,
    candidate: bool,

    phase: Phase,
    round: u64,

    /// MWOE weights convergecast to this node while it is root
    buffer: Vec<Weight>,
    flood: FloodState,
    switches_this_round: usize,

    inbox: Vec<(NodeId, Message)>,
    outbox: Vec<Outgoing>,
    events: Vec<NodeEvent>,

    served: Vec<ServedRequest>,
    responses: Vec<Response>,
}

impl GhsNode {
    /// Create a node with its incident links. Every neighbor starts out
    /// believed to lead its own singleton fragment.
    pub fn new(id: NodeId, neighbors: impl IntoIterator<Item = Neighbor>) -> Self {
        let neighbors: BTreeMap<NodeId, Weight> =
            neighbors.into_iter().map(|n| (n.id, n.weight)).collect();
        let neighbor_fragments = neighbors
            .keys()
            .map(|&n| (n, FragmentId::from(n)))
            .collect();

        Self {
            id,
            neighbors,
            neighbor_fragments,
            fragment: FragmentId::from(id),
            leader: id,
            parent: None,
            mwoe: None,
            fragment_size: 1,
            candidate: false,
            phase: Phase::FindMwoe,
            round: 0,
            buffer: Vec::new(),
            flood: FloodState::new(),
            switches_this_round: 0,
            inbox: Vec::new(),
            outbox: Vec::new(),
            events: Vec::new(),
            served: Vec::new(),
            responses: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn fragment(&self) -> FragmentId {
        self.fragment
    }

    pub fn leader(&self) -> NodeId {
        self.leader
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn mwoe(&self) -> Option<Mwoe> {
        self.mwoe
    }

    pub fn fragment_size(&self) -> usize {
        self.fragment_size
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The node's own round counter. Rewound at every cycle restart.
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn is_candidate(&self) -> bool {
        self.candidate
    }

    /// A node acts as its fragment's root iff it has no parent.
    pub fn is_leader(&self) -> bool {
        self.parent.is_none()
    }

    /// True once the node has reached the terminal phase.
    pub fn is_converged(&self) -> bool {
        self.phase == Phase::Terminal
    }

    /// Requests answered while this node was sink.
    pub fn served(&self) -> &[ServedRequest] {
        &self.served
    }

    /// Responses that reached this node as originator.
    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    pub fn view(&self) -> NodeView {
        NodeView {
            id: self.id,
            fragment: self.fragment,
            leader: self.leader,
            parent: self.parent,
            mwoe: self.mwoe,
            fragment_size: self.fragment_size,
            phase: self.phase,
            round: self.round,
            candidate: self.candidate,
        }
    }

    /// Drain messages queued this round.
    pub fn take_outbox(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    /// Drain events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<NodeEvent> {
        std::mem::take(&mut self.events)
    }

    /// Queue a message sent by `from` for this round's post-round hook.
    pub fn deliver(&mut self, from: NodeId, message: Message) -> Result<()> {
        if !self.neighbors.contains_key(&from) {
            return Err(ProtocolError::NotANeighbor {
                from: self.id,
                to: from,
            });
        }
        self.inbox.push((from, message));
        Ok(())
    }

    /// Pre-round hook: enter the phase for the current round and run its
    /// entry action.
    pub fn on_round_start(&mut self, ctx: &RoundContext) -> Result<()> {
        if self.phase == Phase::Terminal {
            return Ok(());
        }

        let schedule = Schedule::new(ctx.node_count);
        if !schedule.is_entry(self.round) {
            return Ok(());
        }

        let phase = schedule.phase_at(self.round);
        self.enter(phase, ctx);
        match phase {
            Phase::FindMwoe => self.find_mwoe(),
            Phase::AnnounceFragment => self.announce_fragment(),
            Phase::ConvergeMwoe => self.converge_mwoe(),
            Phase::LeaderAggregate => self.aggregate_mwoe(),
            Phase::Reroot => self.reroot(),
            Phase::Connect => self.connect(),
            Phase::CycleCheck => self.cycle_check(&schedule, ctx),
            Phase::Elect | Phase::RecomputeMwoe | Phase::MergeResolve | Phase::Terminal => Ok(()),
        }
    }

    /// Post-round hook: consume every message delivered this round, then
    /// advance the round counter.
    pub fn on_round_end(&mut self, ctx: &RoundContext) -> Result<()> {
        self.switches_this_round = 0;
        for (from, message) in std::mem::take(&mut self.inbox) {
            self.handle(from, message, ctx)?;
        }

        if self.phase == Phase::RecomputeMwoe {
            self.mwoe = self.compute_mwoe();
            debug!(node = %self.id, round = ctx.round, mwoe = ?self.mwoe, "recomputed mwoe");
        }

        self.round += 1;
        Ok(())
    }

    /// Originate an application request toward the sink.
    ///
    /// The request climbs the final tree to its root, collecting the id of
    /// every hop; the sink answers back down the same path.
    pub fn submit_request(&mut self, text: impl Into<String>) -> Result<()> {
        self.require_converged()?;
        let request = Request {
            text: text.into(),
            path: vec![self.id],
        };
        match self.parent {
            Some(parent) => self.send(
                parent,
                Message::Convergecast(ConvergecastEnvelope {
                    origin: self.id,
                    payload: Upcast::Request(request),
                }),
            ),
            None => self.serve(self.id, request),
        }
    }

    /// Reroot the final tree at this node so that requests flow to it.
    pub fn become_sink(&mut self) -> Result<()> {
        self.require_converged()?;
        if self.parent.is_some() {
            self.take_root()?;
        }
        Ok(())
    }

    // Phase entry actions

    fn enter(&mut self, phase: Phase, ctx: &RoundContext) {
        self.phase = phase;
        debug!(node = %self.id, round = ctx.round, %phase, "entering phase");
        self.events.push(NodeEvent::PhaseEntered { phase });
    }

    fn find_mwoe(&mut self) -> Result<()> {
        self.mwoe = self.compute_mwoe();
        let Some(mwoe) = self.mwoe else {
            return Ok(());
        };
        for neighbor in self.neighbor_ids() {
            self.send(neighbor, Message::Mwoe { weight: mwoe.weight })?;
        }
        Ok(())
    }

    fn announce_fragment(&mut self) -> Result<()> {
        let fragment = self.fragment;
        for neighbor in self.neighbor_ids() {
            self.send(neighbor, Message::FragmentAnnounce { fragment })?;
        }
        Ok(())
    }

    fn converge_mwoe(&mut self) -> Result<()> {
        let Some(mwoe) = self.mwoe else {
            return Ok(());
        };
        match self.parent {
            Some(parent) => self.send(
                parent,
                Message::Convergecast(ConvergecastEnvelope {
                    origin: self.id,
                    payload: Upcast::Mwoe {
                        weight: mwoe.weight,
                    },
                }),
            ),
            None => {
                self.buffer.push(mwoe.weight);
                Ok(())
            }
        }
    }

    fn aggregate_mwoe(&mut self) -> Result<()> {
        if !self.is_leader() {
            return Ok(());
        }
        let minimum = self.buffer.iter().copied().min();
        self.buffer.clear();
        let Some(weight) = minimum else {
            return Ok(());
        };

        debug!(node = %self.id, fragment = %self.fragment, weight, "fragment mwoe");
        self.broadcast(Notice::Mwoe { weight })?;
        self.mark_candidate(weight);
        Ok(())
    }

    fn reroot(&mut self) -> Result<()> {
        if self.candidate && self.parent.is_some() {
            self.take_root()?;
        }
        Ok(())
    }

    fn connect(&mut self) -> Result<()> {
        if !self.candidate {
            return Ok(());
        }
        let Some(mwoe) = self.mwoe else {
            return Ok(());
        };
        debug!(node = %self.id, peer = %mwoe.neighbor, weight = mwoe.weight, "connect");
        self.send(
            mwoe.neighbor,
            Message::Connect {
                fragment: self.fragment,
                size: self.fragment_size,
            },
        )
    }

    fn cycle_check(&mut self, schedule: &Schedule, ctx: &RoundContext) -> Result<()> {
        self.candidate = false;
        self.buffer.clear();

        if self.fragment_size == ctx.node_count {
            self.phase = Phase::Terminal;
            info!(
                node = %self.id,
                round = ctx.round,
                leader = %self.leader,
                size = self.fragment_size,
                "converged"
            );
            self.events.push(NodeEvent::Converged {
                leader: self.leader,
                size: self.fragment_size,
            });
            return Ok(());
        }

        self.round = schedule.start_of(Phase::AnnounceFragment);
        self.enter(Phase::AnnounceFragment, ctx);
        self.announce_fragment()
    }

    // Message handling

    fn handle(&mut self, from: NodeId, message: Message, ctx: &RoundContext) -> Result<()> {
        trace!(node = %self.id, %from, kind = %message.kind(), "received");
        match message {
            Message::Mwoe { weight } => {
                self.expect_phase(&[Phase::Elect], MessageKind::Mwoe)?;
                if self.mwoe.is_some_and(|m| m.weight == weight) {
                    // Every fragment is a singleton before the first merge
                    self.merge(from, FragmentId::from(from), 1)?;
                }
                Ok(())
            }
            Message::FragmentAnnounce { fragment } => {
                self.expect_phase(&[Phase::RecomputeMwoe], MessageKind::FragmentAnnounce)?;
                self.neighbor_fragments.insert(from, fragment);
                Ok(())
            }
            Message::Broadcast(envelope) => self.on_broadcast(from, envelope),
            Message::Convergecast(envelope) => self.on_convergecast(from, envelope, ctx),
            Message::Connect { fragment, size } => {
                self.expect_phase(&[Phase::MergeResolve], MessageKind::Connect)?;
                let mutual = self.candidate && self.mwoe.is_some_and(|m| m.neighbor == from);
                if mutual {
                    self.merge(from, fragment, size)
                } else {
                    debug!(node = %self.id, %from, "ignoring connect");
                    Ok(())
                }
            }
            Message::Response(response) => {
                self.expect_phase(&[Phase::Terminal], MessageKind::Response)?;
                self.on_response(response)
            }
        }
    }

    fn on_broadcast(&mut self, from: NodeId, envelope: BroadcastEnvelope) -> Result<()> {
        if self.flood.has_seen(envelope.origin, envelope.sequence) {
            trace!(node = %self.id, origin = %envelope.origin, sequence = envelope.sequence, "duplicate broadcast");
            return Ok(());
        }
        if envelope.fragment != self.fragment {
            trace!(
                node = %self.id,
                origin = %envelope.origin,
                tag = %envelope.fragment,
                fragment = %self.fragment,
                "dropping stale broadcast"
            );
            self.events.push(NodeEvent::StaleBroadcastDropped {
                origin: envelope.origin,
                fragment: envelope.fragment,
            });
            return Ok(());
        }
        self.flood.record(envelope.origin, envelope.sequence);

        for peer in self.fragment_peers(envelope.fragment, Some(from)) {
            trace!(node = %self.id, to = %peer, origin = %envelope.origin, "forwarding broadcast");
            self.send(peer, Message::Broadcast(envelope.clone()))?;
        }

        match envelope.notice {
            Notice::Mwoe { weight } => {
                self.expect_phase(&[Phase::LeaderAggregate], MessageKind::Broadcast)?;
                self.mark_candidate(weight);
            }
            Notice::FragmentChanged {
                leader,
                fragment,
                size,
            } => {
                self.retag_neighbors(envelope.fragment, fragment);
                self.leader = leader;
                self.fragment = fragment;
                self.fragment_size = size;
            }
            Notice::NewLeader { leader } => {
                self.leader = leader;
            }
        }
        Ok(())
    }

    fn on_convergecast(
        &mut self,
        from: NodeId,
        envelope: ConvergecastEnvelope,
        ctx: &RoundContext,
    ) -> Result<()> {
        match envelope.payload {
            Upcast::Mwoe { weight } => {
                self.expect_phase(&[Phase::ConvergeMwoe], MessageKind::Convergecast)?;
                match self.parent {
                    Some(parent) => self.send(
                        parent,
                        Message::Convergecast(ConvergecastEnvelope {
                            origin: envelope.origin,
                            payload: Upcast::Mwoe { weight },
                        }),
                    ),
                    None => {
                        self.buffer.push(weight);
                        Ok(())
                    }
                }
            }
            Upcast::SwitchDirection { new_leader } => {
                self.expect_phase(&[Phase::Reroot, Phase::Terminal], MessageKind::Convergecast)?;
                self.switches_this_round += 1;
                if self.switches_this_round > 1 {
                    return Err(ProtocolError::MultipleSwitches {
                        node: self.id,
                        round: ctx.round,
                    });
                }

                self.leader = new_leader;
                match self.parent.replace(from) {
                    Some(old_parent) => self.send(
                        old_parent,
                        Message::Convergecast(ConvergecastEnvelope {
                            origin: envelope.origin,
                            payload: Upcast::SwitchDirection { new_leader },
                        }),
                    ),
                    None => {
                        debug!(node = %self.id, %new_leader, "handing root to new leader");
                        self.buffer.clear();
                        Ok(())
                    }
                }
            }
            Upcast::Request(mut request) => {
                self.expect_phase(&[Phase::Terminal], MessageKind::Convergecast)?;
                match self.parent {
                    Some(parent) => {
                        request.path.push(self.id);
                        self.send(
                            parent,
                            Message::Convergecast(ConvergecastEnvelope {
                                origin: envelope.origin,
                                payload: Upcast::Request(request),
                            }),
                        )
                    }
                    None => self.serve(envelope.origin, request),
                }
            }
        }
    }

    fn on_response(&mut self, mut response: Response) -> Result<()> {
        match response.path.pop() {
            Some(next) => self.send(next, Message::Response(response)),
            None if response.origin == self.id => {
                debug!(node = %self.id, sink = %response.sink, "response delivered");
                self.events.push(NodeEvent::ResponseDelivered {
                    sink: response.sink,
                });
                self.responses.push(response);
                Ok(())
            }
            None => Err(ProtocolError::MisroutedResponse {
                node: self.id,
                origin: response.origin,
            }),
        }
    }

    // Fragment bookkeeping

    /// Join `peer`'s fragment across the shared edge. Both sides run this
    /// with each other's values and reach the same result: the higher id
    /// roots the merged tree.
    fn merge(&mut self, peer: NodeId, peer_fragment: FragmentId, peer_size: usize) -> Result<()> {
        let total = self.fragment_size + peer_size;

        if self.id > peer {
            self.leader = self.id;
            self.parent = None;
            self.fragment_size = total;
            self.broadcast(Notice::FragmentChanged {
                leader: self.id,
                fragment: self.fragment,
                size: total,
            })?;
            self.neighbor_fragments.insert(peer, self.fragment);
        } else {
            // The notice must leave under the old fragment id
            self.broadcast(Notice::FragmentChanged {
                leader: peer,
                fragment: peer_fragment,
                size: total,
            })?;
            self.retag_neighbors(self.fragment, peer_fragment);
            self.leader = peer;
            self.parent = Some(peer);
            self.fragment = peer_fragment;
            self.fragment_size = total;
        }

        info!(
            node = %self.id,
            %peer,
            leader = %self.leader,
            fragment = %self.fragment,
            size = total,
            "merged"
        );
        self.events.push(NodeEvent::Merged {
            peer,
            leader: self.leader,
            fragment: self.fragment,
            size: total,
        });
        Ok(())
    }

    /// Become root: reverse the parent chain up to the old root and tell
    /// the fragment.
    fn take_root(&mut self) -> Result<()> {
        let previous_parent = self.parent.take();
        if let Some(parent) = previous_parent {
            self.send(
                parent,
                Message::Convergecast(ConvergecastEnvelope {
                    origin: self.id,
                    payload: Upcast::SwitchDirection {
                        new_leader: self.id,
                    },
                }),
            )?;
        }
        self.leader = self.id;
        self.broadcast(Notice::NewLeader { leader: self.id })?;

        info!(node = %self.id, fragment = %self.fragment, "rerooted");
        self.events.push(NodeEvent::Rerooted { previous_parent });
        Ok(())
    }

    fn serve(&mut self, origin: NodeId, request: Request) -> Result<()> {
        info!(node = %self.id, %origin, hops = request.path.len(), "serving request");
        self.events.push(NodeEvent::RequestServed {
            origin,
            hops: request.path.len(),
        });
        self.served.push(ServedRequest {
            origin,
            text: request.text.clone(),
            path: request.path.clone(),
        });

        let mut path = request.path;
        let Some(next) = path.pop() else {
            return Err(ProtocolError::MisroutedResponse {
                node: self.id,
                origin,
            });
        };
        let response = Response {
            origin,
            sink: self.id,
            text: request.text,
            path,
        };
        if next == self.id {
            self.on_response(response)
        } else {
            self.send(next, Message::Response(response))
        }
    }

    fn mark_candidate(&mut self, fragment_minimum: Weight) {
        if self.mwoe.is_some_and(|m| m.weight == fragment_minimum) {
            debug!(node = %self.id, weight = fragment_minimum, "reroot candidate");
            self.candidate = true;
            self.events.push(NodeEvent::Candidate {
                weight: fragment_minimum,
            });
        }
    }

    /// Neighbors recorded in another fragment form the outgoing edges.
    fn compute_mwoe(&self) -> Option<Mwoe> {
        self.neighbors
            .iter()
            .filter(|&(neighbor, _)| self.neighbor_fragments.get(neighbor) != Some(&self.fragment))
            .min_by_key(|&(_, weight)| *weight)
            .map(|(&neighbor, &weight)| Mwoe { neighbor, weight })
    }

    /// Flood a notice through this node's fragment.
    fn broadcast(&mut self, notice: Notice) -> Result<()> {
        let envelope = BroadcastEnvelope {
            origin: self.id,
            fragment: self.fragment,
            sequence: self.flood.originate(self.id),
            notice,
        };
        for peer in self.fragment_peers(envelope.fragment, None) {
            self.send(peer, Message::Broadcast(envelope.clone()))?;
        }
        Ok(())
    }

    /// Neighbors recorded in fragment `tag`, except `except`.
    fn fragment_peers(&self, tag: FragmentId, except: Option<NodeId>) -> Vec<NodeId> {
        self.neighbor_fragments
            .iter()
            .filter(|&(&neighbor, &fragment)| fragment == tag && Some(neighbor) != except)
            .map(|(&neighbor, _)| neighbor)
            .collect()
    }

    /// Members of the old fragment switch along with this node.
    fn retag_neighbors(&mut self, old: FragmentId, new: FragmentId) {
        for fragment in self.neighbor_fragments.values_mut() {
            if *fragment == old {
                *fragment = new;
            }
        }
    }

    fn neighbor_ids(&self) -> Vec<NodeId> {
        self.neighbors.keys().copied().collect()
    }

    fn send(&mut self, to: NodeId, message: Message) -> Result<()> {
        if !self.neighbors.contains_key(&to) {
            return Err(ProtocolError::NotANeighbor { from: self.id, to });
        }
        self.outbox.push(Outgoing {
            from: self.id,
            to,
            message,
        });
        Ok(())
    }

    fn expect_phase(&self, allowed: &[Phase], kind: MessageKind) -> Result<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(ProtocolError::UnexpectedMessage {
                node: self.id,
                phase: self.phase,
                kind,
            })
        }
    }

    fn require_converged(&self) -> Result<()> {
        if self.is_converged() {
            Ok(())
        } else {
            Err(ProtocolError::NotConverged { node: self.id })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use canopy_topology::{generate, GeneratorConfig, Graph};

    /// Minimal lock-step driver. Keeps every sent message with its round.
    struct Harness {
        nodes: BTreeMap<NodeId, GhsNode>,
        in_flight: Vec<Outgoing>,
        sent: Vec<(u64, Outgoing)>,
        round: u64,
    }

    impl Harness {
        fn new(graph: &Graph) -> Self {
            let nodes = graph
                .node_ids()
                .map(|id| (id, GhsNode::new(id, graph.neighbors(id))))
                .collect();
            Self {
                nodes,
                in_flight: Vec::new(),
                sent: Vec::new(),
                round: 0,
            }
        }

        fn step(&mut self) -> Result<()> {
            let ctx = RoundContext {
                round: self.round,
                node_count: self.nodes.len(),
            };
            for node in self.nodes.values_mut() {
                node.on_round_start(&ctx)?;
            }
            for outgoing in std::mem::take(&mut self.in_flight) {
                let target = self.nodes.get_mut(&outgoing.to).unwrap();
                target.deliver(outgoing.from, outgoing.message)?;
            }
            for node in self.nodes.values_mut() {
                node.on_round_end(&ctx)?;
            }
            for node in self.nodes.values_mut() {
                for outgoing in node.take_outbox() {
                    self.sent.push((self.round, outgoing.clone()));
                    self.in_flight.push(outgoing);
                }
            }
            self.round += 1;
            Ok(())
        }

        fn run_until_converged(&mut self) -> u64 {
            let bound = Schedule::new(self.nodes.len()).round_bound();
            while !self.nodes.values().all(GhsNode::is_converged) {
                assert!(self.round <= bound, "no convergence within {} rounds", bound);
                self.step().unwrap();
            }
            self.round
        }

        fn node(&self, id: u64) -> &GhsNode {
            &self.nodes[&NodeId(id)]
        }
    }

    fn scenario() -> Graph {
        Graph::from_links(&[(1, 2, 10), (2, 3, 5), (3, 4, 20), (1, 3, 15)]).unwrap()
    }

    fn middle_node() -> GhsNode {
        GhsNode::new(
            NodeId(2),
            vec![
                Neighbor { id: NodeId(1), weight: 1 },
                Neighbor { id: NodeId(3), weight: 2 },
            ],
        )
    }

    fn switch_from(origin: u64) -> Message {
        Message::Convergecast(ConvergecastEnvelope {
            origin: NodeId(origin),
            payload: Upcast::SwitchDirection {
                new_leader: NodeId(origin),
            },
        })
    }

    #[test]
    fn fresh_node_is_singleton_root() {
        let node = GhsNode::new(NodeId(7), vec![Neighbor { id: NodeId(2), weight: 4 }]);
        assert_eq!(node.fragment(), FragmentId(7));
        assert_eq!(node.leader(), NodeId(7));
        assert!(node.is_leader());
        assert_eq!(node.fragment_size(), 1);
        assert!(!node.is_converged());
    }

    #[test]
    fn mutual_mwoe_merges_toward_higher_id() {
        let mut harness = Harness::new(&scenario());
        harness.step().unwrap();
        harness.step().unwrap();

        let two = harness.node(2);
        let three = harness.node(3);
        assert_eq!(two.parent(), Some(NodeId(3)));
        assert_eq!(two.fragment(), FragmentId(3));
        assert_eq!(two.leader(), NodeId(3));
        assert_eq!(two.fragment_size(), 2);
        assert!(three.is_leader());
        assert_eq!(three.fragment_size(), 2);

        assert!(harness.node(1).is_leader());
        assert_eq!(harness.node(1).fragment(), FragmentId(1));
    }

    #[test]
    fn scenario_converges_to_mst() {
        let mut harness = Harness::new(&scenario());
        harness.run_until_converged();

        for node in harness.nodes.values() {
            assert!(node.is_converged());
            assert_eq!(node.fragment(), FragmentId(4));
            assert_eq!(node.leader(), NodeId(4));
            assert_eq!(node.fragment_size(), 4);
        }
        assert_eq!(harness.node(1).parent(), Some(NodeId(2)));
        assert_eq!(harness.node(2).parent(), Some(NodeId(3)));
        assert_eq!(harness.node(3).parent(), Some(NodeId(4)));
        assert_eq!(harness.node(4).parent(), None);
    }

    #[test]
    fn request_round_trip_over_final_tree() {
        let mut harness = Harness::new(&scenario());
        harness.run_until_converged();

        harness
            .nodes
            .get_mut(&NodeId(1))
            .unwrap()
            .submit_request("ping")
            .unwrap();
        for _ in 0..8 {
            harness.step().unwrap();
        }

        let served = harness.node(4).served();
        assert_eq!(served.len(), 1);
        assert_eq!(served[0].path, vec![NodeId(1), NodeId(2), NodeId(3)]);
        let responses = harness.node(1).responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].sink, NodeId(4));
        assert_eq!(responses[0].text, "ping");
    }

    #[test]
    fn sink_designation_reroots_tree() {
        let mut harness = Harness::new(&scenario());
        harness.run_until_converged();

        harness.nodes.get_mut(&NodeId(1)).unwrap().become_sink().unwrap();
        for _ in 0..6 {
            harness.step().unwrap();
        }

        assert!(harness.node(1).is_leader());
        assert_eq!(harness.node(2).parent(), Some(NodeId(1)));
        assert_eq!(harness.node(3).parent(), Some(NodeId(2)));
        assert_eq!(harness.node(4).parent(), Some(NodeId(3)));
        for node in harness.nodes.values() {
            assert_eq!(node.leader(), NodeId(1));
        }
    }

    #[test]
    fn root_serves_its_own_request() {
        let mut harness = Harness::new(&scenario());
        harness.run_until_converged();

        let sink = harness.nodes.get_mut(&NodeId(4)).unwrap();
        sink.submit_request("local").unwrap();
        assert_eq!(sink.served().len(), 1);
        assert_eq!(sink.responses().len(), 1);
    }

    #[test]
    fn requests_need_convergence() {
        let mut node = GhsNode::new(NodeId(1), vec![Neighbor { id: NodeId(2), weight: 1 }]);
        assert_eq!(
            node.submit_request("early"),
            Err(ProtocolError::NotConverged { node: NodeId(1) })
        );
        assert!(node.become_sink().is_err());
    }

    #[test]
    fn rejects_non_neighbor_sender() {
        let mut node = GhsNode::new(NodeId(1), vec![Neighbor { id: NodeId(2), weight: 1 }]);
        let result = node.deliver(NodeId(9), Message::Mwoe { weight: 1 });
        assert_eq!(
            result,
            Err(ProtocolError::NotANeighbor {
                from: NodeId(1),
                to: NodeId(9)
            })
        );
    }

    #[test]
    fn direct_mwoe_outside_elect_is_violation() {
        let mut node = GhsNode::new(NodeId(1), vec![Neighbor { id: NodeId(2), weight: 1 }]);
        let ctx = RoundContext {
            round: 0,
            node_count: 2,
        };
        node.on_round_start(&ctx).unwrap();
        node.deliver(NodeId(2), Message::Mwoe { weight: 1 }).unwrap();
        let err = node.on_round_end(&ctx).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnexpectedMessage {
                phase: Phase::FindMwoe,
                kind: MessageKind::Mwoe,
                ..
            }
        ));
    }

    #[test]
    fn stale_broadcast_is_dropped() {
        let mut node = GhsNode::new(NodeId(1), vec![Neighbor { id: NodeId(2), weight: 1 }]);
        let ctx = RoundContext {
            round: 0,
            node_count: 2,
        };
        node.deliver(
            NodeId(2),
            Message::Broadcast(BroadcastEnvelope {
                origin: NodeId(2),
                fragment: FragmentId(2),
                sequence: 0,
                notice: Notice::NewLeader { leader: NodeId(2) },
            }),
        )
        .unwrap();
        node.on_round_end(&ctx).unwrap();

        assert_eq!(node.leader(), NodeId(1));
        assert!(node.take_outbox().is_empty());
        assert!(node
            .take_events()
            .iter()
            .any(|e| matches!(e, NodeEvent::StaleBroadcastDropped { .. })));
    }

    #[test]
    fn single_node_converges_alone() {
        let mut graph = Graph::new();
        graph.add_node(NodeId(1)).unwrap();
        let mut harness = Harness::new(&graph);
        let rounds = harness.run_until_converged();
        assert_eq!(rounds, Schedule::new(1).start_of(Phase::CycleCheck) + 1);
        assert!(harness.node(1).is_leader());
    }

    #[test]
    fn broadcasts_forwarded_once_per_link() {
        for seed in 0..6 {
            let config = GeneratorConfig::with_nodes(20)
                .with_max_degree(8)
                .with_seed(seed);
            let mut harness = Harness::new(&generate(&config).unwrap());
            harness.run_until_converged();

            let mut links: BTreeMap<(NodeId, NodeId, u64, NodeId), usize> = BTreeMap::new();
            let mut rounds: BTreeMap<(NodeId, NodeId, u64), BTreeSet<u64>> = BTreeMap::new();
            for (round, outgoing) in &harness.sent {
                let Message::Broadcast(envelope) = &outgoing.message else {
                    continue;
                };
                let pair = (outgoing.from, envelope.origin, envelope.sequence);
                *links.entry((pair.0, pair.1, pair.2, outgoing.to)).or_default() += 1;
                rounds.entry(pair).or_default().insert(*round);
            }

            assert!(!links.is_empty(), "seed {seed}: no broadcasts");
            for (key, count) in &links {
                assert_eq!(*count, 1, "seed {seed}: {key:?} sent {count} times");
            }
            for (pair, sent_in) in &rounds {
                assert_eq!(sent_in.len(), 1, "seed {seed}: {pair:?} sent in rounds {sent_in:?}");
            }
        }
    }

    #[test]
    fn single_switch_adopts_sender_as_parent() {
        let mut node = middle_node();
        node.phase = Phase::Reroot;
        let ctx = RoundContext {
            round: 16,
            node_count: 3,
        };
        node.deliver(NodeId(3), switch_from(3)).unwrap();
        node.on_round_end(&ctx).unwrap();

        assert_eq!(node.parent(), Some(NodeId(3)));
        assert_eq!(node.leader(), NodeId(3));
    }

    #[test]
    fn second_switch_in_one_round_is_violation() {
        let mut node = middle_node();
        node.phase = Phase::Reroot;
        let ctx = RoundContext {
            round: 16,
            node_count: 3,
        };
        node.deliver(NodeId(1), switch_from(1)).unwrap();
        node.deliver(NodeId(3), switch_from(3)).unwrap();

        assert_eq!(
            node.on_round_end(&ctx),
            Err(ProtocolError::MultipleSwitches {
                node: NodeId(2),
                round: 16
            })
        );
    }

    #[test]
    fn response_out_of_hops_is_misrouted() {
        let mut node = middle_node();
        node.phase = Phase::Terminal;
        let ctx = RoundContext {
            round: 30,
            node_count: 3,
        };
        node.deliver(
            NodeId(3),
            Message::Response(Response {
                origin: NodeId(1),
                sink: NodeId(3),
                text: "lost".into(),
                path: Vec::new(),
            }),
        )
        .unwrap();

        assert_eq!(
            node.on_round_end(&ctx),
            Err(ProtocolError::MisroutedResponse {
                node: NodeId(2),
                origin: NodeId(1)
            })
        );
        assert!(node.responses().is_empty());
    }

    #[test]
    fn request_without_path_is_misrouted() {
        let mut node = middle_node();
        node.phase = Phase::Terminal;
        let ctx = RoundContext {
            round: 30,
            node_count: 3,
        };
        node.deliver(
            NodeId(1),
            Message::Convergecast(ConvergecastEnvelope {
                origin: NodeId(1),
                payload: Upcast::Request(Request {
                    text: "no path".into(),
                    path: Vec::new(),
                }),
            }),
        )
        .unwrap();

        assert_eq!(
            node.on_round_end(&ctx),
            Err(ProtocolError::MisroutedResponse {
                node: NodeId(2),
                origin: NodeId(1)
            })
        );
    }
}
