//! Canopy Topology
//!
//! The weighted graph every protocol run executes on.
//!
//! # Model
//!
//! A [`Graph`] is a fixed, undirected registry of nodes and [`Link`]s. Every
//! link carries one immutable positive weight that is identical in both
//! directions, plus an orientation attribute that records which endpoint the
//! current spanning tree points toward. Orientation is for inspection only;
//! nothing in the protocol reads it.
//!
//! # Invariants
//!
//! - Node ids are unique and totally ordered.
//! - Link weights are positive and globally distinct, so the minimum spanning
//!   tree is unique and MWOE selection never needs a weight tie-break.
//! - A graph handed to a protocol run is connected ([`Graph::validate`]).
//!
//! # Reference MST
//!
//! [`kruskal`] computes the reference tree that distributed runs are checked
//! against.

mod error;
mod generate;
mod graph;
mod link;
mod mst;

pub use error::{Result, TopologyError};
pub use generate::{generate, GeneratorConfig, DEFAULT_MAX_DEGREE, DEFAULT_MAX_WEIGHT};
pub use graph::{Graph, Neighbor};
pub use link::{Link, NodeId, Weight};
pub use mst::{kruskal, minimum_spanning_weight};
