//! greenline-traffic — network exposure for blue/green deployments.
//!
//! Models the traffic layer the promotion controller mutates: a
//! listener that points at exactly one of two interchangeable target
//! groups, and the swap that moves all traffic from the active group to
//! the standby group in a single atomic step.
//!
//! # Components
//!
//! - **`group`** — Target groups and per-target health bookkeeping
//! - **`listener`** — The listener with its atomically-swapped default group
//! - **`exposure`** — The two blue/green exposure strategies (network / application)

pub mod error;
pub mod exposure;
pub mod group;
pub mod listener;

pub use error::{TrafficError, TrafficResult};
pub use exposure::{BlueGreenExposure, ExposureStrategy};
pub use group::{Target, TargetGroup, TargetHealth};
pub use listener::Listener;
