//! Target groups — named sets of backends a listener can route to.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use greenline_core::{Protocol, TargetGroupId};

use crate::error::{TrafficError, TrafficResult};

/// A single backend registered in a target group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Task identity, unique within the group.
    pub id: String,
    /// Reachable address, `ip:port`.
    pub address: String,
}

/// Health of a registered target as last reported by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetHealth {
    Healthy,
    Unhealthy,
    /// Registered but not yet probed.
    Unknown,
}

/// A named set of backends with per-target health.
///
/// Interior mutability via `RwLock` so the group can be shared between
/// the promotion controller (registering/deregistering) and probe tasks
/// (recording health) without external locking.
pub struct TargetGroup {
    id: TargetGroupId,
    port: u16,
    protocol: Protocol,
    /// HTTP health-check path for application exposures; `None` means
    /// connect-level (TCP) checks.
    health_check_path: Option<String>,
    targets: RwLock<HashMap<String, (Target, TargetHealth)>>,
}

impl TargetGroup {
    pub fn new(
        id: &str,
        port: u16,
        protocol: Protocol,
        health_check_path: Option<String>,
    ) -> Self {
        Self {
            id: id.to_string(),
            port,
            protocol,
            health_check_path,
            targets: RwLock::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn health_check_path(&self) -> Option<&str> {
        self.health_check_path.as_deref()
    }

    /// Register a target. New targets start `Unknown` until probed.
    pub fn register(&self, target: Target) {
        debug!(group = %self.id, target = %target.id, address = %target.address, "target registered");
        let mut targets = self.targets.write().unwrap();
        targets.insert(target.id.clone(), (target, TargetHealth::Unknown));
    }

    /// Deregister one target, returning it if it was registered.
    pub fn deregister(&self, target_id: &str) -> Option<Target> {
        let mut targets = self.targets.write().unwrap();
        let removed = targets.remove(target_id).map(|(t, _)| t);
        if removed.is_some() {
            debug!(group = %self.id, target = %target_id, "target deregistered");
        }
        removed
    }

    /// Deregister every target, returning them for teardown.
    pub fn deregister_all(&self) -> Vec<Target> {
        let mut targets = self.targets.write().unwrap();
        let drained: Vec<Target> = targets.drain().map(|(_, (t, _))| t).collect();
        if !drained.is_empty() {
            debug!(group = %self.id, count = drained.len(), "all targets deregistered");
        }
        drained
    }

    /// Record a probe result for one target.
    pub fn set_health(&self, target_id: &str, health: TargetHealth) -> TrafficResult<()> {
        let mut targets = self.targets.write().unwrap();
        match targets.get_mut(target_id) {
            Some((_, h)) => {
                *h = health;
                Ok(())
            }
            None => Err(TrafficError::UnknownTarget {
                group: self.id.clone(),
                target: target_id.to_string(),
            }),
        }
    }

    pub fn target_count(&self) -> usize {
        self.targets.read().unwrap().len()
    }

    pub fn healthy_count(&self) -> usize {
        self.targets
            .read()
            .unwrap()
            .values()
            .filter(|(_, h)| *h == TargetHealth::Healthy)
            .count()
    }

    /// Whether every registered target reports healthy. An empty group
    /// is never considered healthy — there is nothing to route to.
    pub fn all_healthy(&self) -> bool {
        let targets = self.targets.read().unwrap();
        !targets.is_empty() && targets.values().all(|(_, h)| *h == TargetHealth::Healthy)
    }

    /// Snapshot of the registered targets.
    pub fn targets(&self) -> Vec<Target> {
        self.targets
            .read()
            .unwrap()
            .values()
            .map(|(t, _)| t.clone())
            .collect()
    }
}
