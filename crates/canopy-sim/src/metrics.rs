//! Message accounting.

use std::collections::BTreeMap;

use canopy_ghs::MessageKind;
use serde::{Deserialize, Serialize};

/// Delivered message counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetrics {
    total: u64,
    by_kind: BTreeMap<MessageKind, u64>,
    per_round: Vec<u64>,
}

impl MessageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one delivery in `round`.
    pub fn record(&mut self, round: u64, kind: MessageKind) {
        self.total += 1;
        *self.by_kind.entry(kind).or_default() += 1;

        let index = round as usize;
        if self.per_round.len() <= index {
            self.per_round.resize(index + 1, 0);
        }
        self.per_round[index] += 1;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn count(&self, kind: MessageKind) -> u64 {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn by_kind(&self) -> &BTreeMap<MessageKind, u64> {
        &self.by_kind
    }

    /// Deliveries in `round` (zero for rounds never reached).
    pub fn in_round(&self, round: u64) -> u64 {
        self.per_round.get(round as usize).copied().unwrap_or(0)
    }

    /// The busiest round and its delivery count.
    pub fn peak_round(&self) -> Option<(u64, u64)> {
        self.per_round
            .iter()
            .enumerate()
            .max_by_key(|&(round, &count)| (count, std::cmp::Reverse(round)))
            .map(|(round, &count)| (round as u64, count))
    }
}
