//! Domain types persisted by the greenline state store.
//!
//! These represent the control plane's view of live cluster state:
//! which services exist, which task specification revision each one is
//! running, and the archive of past promotion attempts.

use serde::{Deserialize, Serialize};

use greenline_core::{AttemptId, ImageRef, ServiceDescriptor, ServiceId};

// ── Services ──────────────────────────────────────────────────────

/// The control plane's record of a deployed service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceRecord {
    pub id: ServiceId,
    pub cluster: String,
    /// Image repository watched for new tags.
    pub image_repository: String,
    /// Name of the container inside the task (referenced by the
    /// traffic-shift specification's load balancer info).
    pub container_name: String,
    /// Port the load balancer forwards to on that container.
    pub container_port: u16,
    pub desired_count: u32,
    /// Cloud-map style discovery name, when registered.
    pub discovery_name: Option<String>,
    /// Revision of the task specification currently serving traffic.
    pub task_spec_revision: u32,
    pub status: ServiceStatus,
    /// Unix timestamp (seconds) when this record was created.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last update.
    pub updated_at: u64,
}

/// Whether a service is safe to derive descriptors from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Steady state; live configuration is consistent.
    Stable,
    /// A promotion attempt is mutating the service.
    Transitioning,
}

// ── Task specifications ───────────────────────────────────────────

/// A live task specification as the cluster reports it: the portable
/// descriptor plus the server-assigned fields the descriptor generator
/// strips.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskSpecRecord {
    pub service: ServiceId,
    #[serde(flatten)]
    pub descriptor: ServiceDescriptor,
    /// Server-assigned revision number.
    pub revision: u32,
    /// Server-assigned status (e.g. "ACTIVE").
    pub status: String,
    /// Unix timestamp when the cluster registered this revision.
    pub registered_at: u64,
    /// Principal that registered it.
    pub registered_by: String,
    /// Launch-type compatibility list reported by the cluster.
    pub compatibilities: Vec<String>,
    /// Placement constraints attached by the cluster.
    pub placement_constraints: Vec<String>,
}

// ── Promotion attempts ────────────────────────────────────────────

/// Terminal outcome of an archived promotion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Promoted,
    RolledBack,
    Failed,
}

/// Archived record of a finished promotion attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptRecord {
    pub id: AttemptId,
    pub service: ServiceId,
    /// Unknown when the attempt failed before live state was read.
    pub old_image: Option<ImageRef>,
    pub new_image: ImageRef,
    pub outcome: AttemptOutcome,
    /// Present for `RolledBack` and `Failed` outcomes.
    pub failure_reason: Option<String>,
    pub created_at: u64,
    pub finished_at: u64,
}

impl TaskSpecRecord {
    /// Build the composite key for the task spec table. Revisions are
    /// zero-padded so lexicographic order matches numeric order.
    pub fn table_key(&self) -> String {
        task_spec_key(&self.service, self.revision)
    }
}

/// Composite task spec key for a given service and revision.
pub fn task_spec_key(service: &str, revision: u32) -> String {
    format!("{service}:{revision:08}")
}
