//! greenline-descriptor — derives deployment documents from live state.
//!
//! Given a running service, produce the two documents the promotion
//! pipeline consumes unchanged:
//!
//! 1. a **sanitized task specification** — the live task spec with
//!    every server-assigned field stripped, usable as the template for
//!    the next revision, and
//! 2. a **traffic-shift specification** — which service, which task
//!    spec revision, and the container name/port the load balancer
//!    forwards to.
//!
//! Generation is read-only against live state and deterministic: the
//! same live state always yields byte-identical documents.

pub mod error;
pub mod generator;

pub use error::{DescriptorError, DescriptorResult};
pub use generator::{
    DeploymentDescriptor, LiveState, LoadBalancerInfo, TrafficShiftSpec, canonical_json,
    generate, sanitize, strip_server_fields,
};
