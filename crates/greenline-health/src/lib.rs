//! greenline-health — health probes and standby verification.
//!
//! Two jobs: probe individual targets (HTTP path or TCP connect,
//! depending on the exposure strategy) and decide, within a bounded
//! window, whether a standby target group is fit to receive traffic.
//!
//! # Components
//!
//! - **`checker`** — single-target probes and the consecutive-failure tracker
//! - **`prober`** — background probe loop feeding health into a target group
//! - **`verify`** — bounded wait for a whole group to report healthy

pub mod checker;
pub mod prober;
pub mod verify;

pub use checker::{HealthTracker, ProbeResult, http_probe, tcp_probe};
pub use prober::run_probe_loop;
pub use verify::{VerifyError, verify_group};
