//! greenline-topology — configuration-driven topology selection.
//!
//! A deployment is one of a small family of topologies (single-stage,
//! blue/green, blue/green behind a proxy tier) rather than a free-form
//! resource graph. This crate turns a parsed `Config` into a
//! `BuildPlan`: the set of resources the selected topology actually
//! needs, as an explicit dependency graph with a deterministic
//! topological order.

pub mod error;
pub mod plan;

pub use error::{TopologyError, TopologyResult};
pub use plan::{BuildPlan, NodeKind, ResourceNode, TopologyKind, plan};
