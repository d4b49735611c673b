//! Round-driven phase schedule.
//!
//! Every node derives its phase from its own round counter and the node
//! count `N`; no phase-start message exists. Any fragment-scoped flood
//! needs at most `N - 1` hops (a fragment shaped as a path), and a hop takes
//! one round, so every flooding phase reserves `N` rounds.
//!
//! | Phase            | Rounds             |
//! |------------------|--------------------|
//! | FindMwoe         | `0`                |
//! | Elect            | `1 ..= N+1`        |
//! | AnnounceFragment | `N+2`              |
//! | RecomputeMwoe    | `N+3`              |
//! | ConvergeMwoe     | `N+4 ..= 2N+3`     |
//! | LeaderAggregate  | `2N+4 ..= 3N+3`    |
//! | Reroot           | `3N+4 ..= 4N+3`    |
//! | Connect          | `4N+4`             |
//! | MergeResolve     | `4N+5 ..= 5N+4`    |
//! | CycleCheck       | `5N+5`             |
//!
//! CycleCheck either ends the run ([`Phase::Terminal`]) or transitions back to
//! AnnounceFragment, which is the start of every later cycle.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Protocol phases, in schedule order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    FindMwoe,
    Elect,
    AnnounceFragment,
    RecomputeMwoe,
    ConvergeMwoe,
    LeaderAggregate,
    Reroot,
    Connect,
    MergeResolve,
    CycleCheck,
    Terminal,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FindMwoe => "FIND_MWOE",
            Self::Elect => "ELECT",
            Self::AnnounceFragment => "ANNOUNCE_FRAGMENT",
            Self::RecomputeMwoe => "RECOMPUTE_MWOE",
            Self::ConvergeMwoe => "CONVERGE_MWOE",
            Self::LeaderAggregate => "LEADER_AGGREGATE",
            Self::Reroot => "REROOT",
            Self::Connect => "CONNECT",
            Self::MergeResolve => "MERGE_RESOLVE",
            Self::CycleCheck => "CYCLE_CHECK",
            Self::Terminal => "TERMINAL",
        };
        f.write_str(name)
    }
}

/// Phase thresholds for a graph of `N` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    n: u64,
}

impl Schedule {
    /// Schedule for `node_count` nodes.
    pub const fn new(node_count: usize) -> Self {
        Self {
            n: node_count as u64,
        }
    }

    /// First round of a phase. Terminal has no start round and reports
    /// `u64::MAX`.
    pub const fn start_of(&self, phase: Phase) -> u64 {
        let n = self.n;
        match phase {
            Phase::FindMwoe => 0,
            Phase::Elect => 1,
            Phase::AnnounceFragment => n + 2,
            Phase::RecomputeMwoe => n + 3,
            Phase::ConvergeMwoe => n + 4,
            Phase::LeaderAggregate => 2 * n + 4,
            Phase::Reroot => 3 * n + 4,
            Phase::Connect => 4 * n + 4,
            Phase::MergeResolve => 4 * n + 5,
            Phase::CycleCheck => 5 * n + 5,
            Phase::Terminal => u64::MAX,
        }
    }

    /// The phase a node is in at `round`. Never returns Terminal; that
    /// state is only entered through CycleCheck.
    pub const fn phase_at(&self, round: u64) -> Phase {
        if round == 0 {
            Phase::FindMwoe
        } else if round < self.start_of(Phase::AnnounceFragment) {
            Phase::Elect
        } else if round < self.start_of(Phase::RecomputeMwoe) {
            Phase::AnnounceFragment
        } else if round < self.start_of(Phase::ConvergeMwoe) {
            Phase::RecomputeMwoe
        } else if round < self.start_of(Phase::LeaderAggregate) {
            Phase::ConvergeMwoe
        } else if round < self.start_of(Phase::Reroot) {
            Phase::LeaderAggregate
        } else if round < self.start_of(Phase::Connect) {
            Phase::Reroot
        } else if round < self.start_of(Phase::MergeResolve) {
            Phase::Connect
        } else if round < self.start_of(Phase::CycleCheck) {
            Phase::MergeResolve
        } else {
            Phase::CycleCheck
        }
    }

    /// Whether `round` is the first round of its phase.
    pub const fn is_entry(&self, round: u64) -> bool {
        self.start_of(self.phase_at(round)) == round
    }

    /// Rounds from AnnounceFragment through CycleCheck inclusive.
    pub const fn cycle_length(&self) -> u64 {
        self.start_of(Phase::CycleCheck) - self.start_of(Phase::AnnounceFragment) + 1
    }

    /// Upper bound on rounds until every node is terminal.
    ///
    /// Each cycle merges at least one pair of fragments, so at most `N - 1`
    /// cycles follow the initial election (one extra cycle detects
    /// termination).
    pub const fn round_bound(&self) -> u64 {
        self.start_of(Phase::AnnounceFragment) + self.n * self.cycle_length()
    }
}
