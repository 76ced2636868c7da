//! The listener — a load balancer entry point with an atomically
//! swapped default target group.
//!
//! The default group is an index into the exposure's two-group pair,
//! held in an `AtomicUsize`. A swap is a single `fetch_xor(1)`, so any
//! concurrent reader observes either the pre-swap or the post-swap
//! group — never a third value and never a partial split.

use std::sync::atomic::{AtomicUsize, Ordering};

use greenline_core::Protocol;

/// Listener routing state. Mutated only by the promotion controller.
pub struct Listener {
    port: u16,
    protocol: Protocol,
    default_idx: AtomicUsize,
}

impl Listener {
    /// Create a listener pointing at group 0 (blue).
    pub fn new(port: u16, protocol: Protocol) -> Self {
        Self {
            port,
            protocol,
            default_idx: AtomicUsize::new(0),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Index (0 or 1) of the group currently receiving all traffic.
    pub fn default_index(&self) -> usize {
        self.default_idx.load(Ordering::Acquire)
    }

    /// Atomically flip the default group. Returns the index traffic
    /// now flows to.
    pub fn swap_default(&self) -> usize {
        let old = self.default_idx.fetch_xor(1, Ordering::AcqRel);
        old ^ 1
    }
}
