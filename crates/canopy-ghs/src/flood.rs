//! Broadcast sequencing and duplicate suppression.

use std::collections::{BTreeMap, BTreeSet};

use canopy_topology::NodeId;

/// Per-node flood bookkeeping: the next sequence number this node stamps on
/// its own broadcasts, and every `(origin, sequence)` pair already handled.
///
/// A pair is handled at most once, so each member forwards a given
/// broadcast at most once and a flood costs one transmission per fragment
/// edge in each direction at most.
#[derive(Debug, Clone, Default)]
pub struct FloodState {
    next_sequence: u64,
    seen: BTreeMap<NodeId, BTreeSet<u64>>,
}

impl FloodState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a sequence number for a broadcast originated by `origin`
    /// and mark it as seen, so echoes are dropped.
    pub fn originate(&mut self, origin: NodeId) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.seen.entry(origin).or_default().insert(sequence);
        sequence
    }

    /// Record `(origin, sequence)` as handled.
    pub fn record(&mut self, origin: NodeId, sequence: u64) {
        self.seen.entry(origin).or_default().insert(sequence);
    }

    /// Whether `(origin, sequence)` has been recorded.
    pub fn has_seen(&self, origin: NodeId, sequence: u64) -> bool {
        self.seen
            .get(&origin)
            .is_some_and(|sequences| sequences.contains(&sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_increase() {
        let mut flood = FloodState::new();
        let me = NodeId(3);
        assert_eq!(flood.originate(me), 0);
        assert_eq!(flood.originate(me), 1);
        assert!(flood.has_seen(me, 0));
        assert!(flood.has_seen(me, 1));
        assert!(!flood.has_seen(me, 2));
    }

    #[test]
    fn records_per_origin() {
        let mut flood = FloodState::new();
        assert!(!flood.has_seen(NodeId(1), 7));
        flood.record(NodeId(1), 7);
        assert!(flood.has_seen(NodeId(1), 7));
        assert!(!flood.has_seen(NodeId(2), 7));
    }

    #[test]
    fn own_broadcast_echo_rejected() {
        let mut flood = FloodState::new();
        let me = NodeId(5);
        let sequence = flood.originate(me);
        assert!(flood.has_seen(me, sequence));
    }
}
