//! Descriptor generation — query live state, strip server-assigned
//! fields, derive the traffic-shift document.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use greenline_core::{ServiceDescriptor, ServiceId};
use greenline_state::{ServiceRecord, ServiceStatus, StateStore, TaskSpecRecord, task_spec_key};

use crate::error::{DescriptorError, DescriptorResult};

/// Fields the cluster assigns on registration. They are environment-
/// specific and must never travel into the next revision's template.
pub const SERVER_ASSIGNED_FIELDS: &[&str] = &[
    "revision",
    "status",
    "registered_at",
    "registered_by",
    "compatibilities",
    "placement_constraints",
];

/// Read-only view of live cluster state.
///
/// The production implementation is the state store; tests substitute
/// fixtures. Both operations only describe — nothing here can mutate.
pub trait LiveState {
    fn describe_service(&self, id: &str) -> DescriptorResult<Option<ServiceRecord>>;
    fn describe_task_spec(
        &self,
        service: &str,
        revision: u32,
    ) -> DescriptorResult<Option<TaskSpecRecord>>;
}

impl LiveState for StateStore {
    fn describe_service(&self, id: &str) -> DescriptorResult<Option<ServiceRecord>> {
        Ok(self.get_service(id)?)
    }

    fn describe_task_spec(
        &self,
        service: &str,
        revision: u32,
    ) -> DescriptorResult<Option<TaskSpecRecord>> {
        Ok(self.get_task_spec(service, revision)?)
    }
}

/// Load balancer wiring copied from the live service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerInfo {
    pub container_name: String,
    pub container_port: u16,
}

/// The traffic-shift half of a deployment: which service to move, from
/// which task spec revision, through which container port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficShiftSpec {
    pub version: String,
    pub target_service: ServiceId,
    /// Reference to the task spec revision this shift was derived from.
    pub task_spec: String,
    pub load_balancer_info: LoadBalancerInfo,
}

/// Everything one promotion attempt needs, derived from live state.
///
/// Created per attempt and consumed once; a failed attempt requires a
/// fresh descriptor derived from then-current live state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDescriptor {
    pub service: ServiceId,
    /// Sanitized template for the next revision.
    pub task_spec: ServiceDescriptor,
    pub traffic_shift: TrafficShiftSpec,
    /// Verification window for the standby group.
    pub verify_timeout: Duration,
}

/// Remove every server-assigned field from a serialized task spec.
pub fn strip_server_fields(doc: &mut serde_json::Value) {
    if let Some(obj) = doc.as_object_mut() {
        for field in SERVER_ASSIGNED_FIELDS {
            obj.remove(*field);
        }
    }
}

/// Strip a live task spec record down to its portable descriptor.
pub fn sanitize(record: &TaskSpecRecord) -> DescriptorResult<ServiceDescriptor> {
    let mut doc = serde_json::to_value(record)?;
    strip_server_fields(&mut doc);
    if let Some(obj) = doc.as_object_mut() {
        // The owning service is carried separately in the descriptor's
        // envelope, not inside the template.
        obj.remove("service");
    }
    Ok(serde_json::from_value(doc)?)
}

/// Serialize a document to its canonical JSON form.
///
/// Descriptor maps are `BTreeMap`s and struct fields serialize in
/// declaration order, so equal documents are byte-identical strings.
pub fn canonical_json<T: Serialize>(value: &T) -> DescriptorResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Derive a deployment descriptor from a service's live configuration.
///
/// Fails with `NotFound` when the service or its current task spec is
/// absent, and with `InvalidState` when the service is mid-transition.
/// No side effects: both live-state queries only describe.
pub fn generate(
    live: &impl LiveState,
    service_id: &str,
    verify_timeout: Duration,
) -> DescriptorResult<DeploymentDescriptor> {
    let service = live
        .describe_service(service_id)?
        .ok_or_else(|| DescriptorError::NotFound(format!("service {service_id}")))?;

    if service.status == ServiceStatus::Transitioning {
        return Err(DescriptorError::InvalidState(format!(
            "service {service_id} is mid-transition"
        )));
    }

    let revision = service.task_spec_revision;
    let record = live
        .describe_task_spec(service_id, revision)?
        .ok_or_else(|| {
            DescriptorError::NotFound(format!(
                "task spec {}",
                task_spec_key(service_id, revision)
            ))
        })?;

    let task_spec = sanitize(&record)?;
    let traffic_shift = TrafficShiftSpec {
        version: "0.0".to_string(),
        target_service: service.id.clone(),
        task_spec: task_spec_key(service_id, revision),
        load_balancer_info: LoadBalancerInfo {
            container_name: service.container_name.clone(),
            container_port: service.container_port,
        },
    };

    debug!(
        service = %service_id,
        revision,
        image = %task_spec.image,
        "deployment descriptor generated"
    );

    Ok(DeploymentDescriptor {
        service: service.id,
        task_spec,
        traffic_shift,
        verify_timeout,
    })
}
