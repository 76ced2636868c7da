//! Endpoint-backed task launcher.
//!
//! The daemon does not schedule containers itself; the cluster
//! scheduler runs tasks at a fixed set of configured addresses. A
//! "launch" here assigns those addresses to the new revision so the
//! probe loop and target groups can track it; teardown releases them.

use std::sync::Mutex;

use tracing::{debug, info};

use greenline_core::ServiceDescriptor;
use greenline_promote::{BoxFuture, PromoteError, PromoteResult, TaskLauncher};
use greenline_traffic::Target;

pub struct EndpointLauncher {
    endpoints: Vec<String>,
    /// Endpoints currently assigned to a live revision.
    assigned: Mutex<Vec<String>>,
}

impl EndpointLauncher {
    pub fn new(endpoints: Vec<String>) -> Self {
        Self {
            endpoints,
            assigned: Mutex::new(Vec::new()),
        }
    }
}

impl TaskLauncher for EndpointLauncher {
    fn launch(
        &self,
        service: &str,
        descriptor: &ServiceDescriptor,
        count: u32,
    ) -> BoxFuture<PromoteResult<Vec<Target>>> {
        let service = service.to_string();
        let tag = descriptor.image.tag.clone();
        let assigned = self.assigned.lock().unwrap().clone();
        let free: Vec<String> = self
            .endpoints
            .iter()
            .filter(|e| !assigned.contains(e))
            .cloned()
            .collect();
        let result = if free.len() < count as usize {
            Err(PromoteError::Launch(format!(
                "service {service} needs {count} task endpoints, {} free of {} configured",
                free.len(),
                self.endpoints.len()
            )))
        } else {
            let picked: Vec<String> = free.into_iter().take(count as usize).collect();
            self.assigned.lock().unwrap().extend(picked.iter().cloned());
            info!(%service, %tag, tasks = picked.len(), "revision tasks launched");
            Ok(picked
                .into_iter()
                .enumerate()
                .map(|(i, address)| Target {
                    id: format!("{service}-{tag}-{i}"),
                    address,
                })
                .collect())
        };
        Box::pin(async move { result })
    }

    fn tear_down(&self, service: &str, targets: Vec<Target>) -> BoxFuture<()> {
        let service = service.to_string();
        let mut assigned = self.assigned.lock().unwrap();
        for target in &targets {
            assigned.retain(|a| a != &target.address);
        }
        drop(assigned);
        Box::pin(async move {
            debug!(%service, tasks = targets.len(), "revision tasks torn down");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenline_core::{
        HealthProbeSpec, ImageRef, PortMapping, Protocol, ResourceLimits,
    };
    use std::collections::BTreeMap;

    fn descriptor(tag: &str) -> ServiceDescriptor {
        ServiceDescriptor {
            image: ImageRef::new("registry.example.com/portfolio/app", tag),
            exposed_port: 8000,
            health_check: HealthProbeSpec::HttpPath {
                path: "/health".to_string(),
            },
            env: BTreeMap::new(),
            secrets: BTreeMap::new(),
            mounts: vec![],
            port_mappings: vec![PortMapping {
                container_port: 8000,
                host_port: 8000,
                protocol: Protocol::Tcp,
            }],
            resources: ResourceLimits::default(),
            working_directory: None,
            command: None,
        }
    }

    #[tokio::test]
    async fn assigns_free_endpoints_and_releases_on_teardown() {
        let launcher = EndpointLauncher::new(vec![
            "10.0.9.1:8000".to_string(),
            "10.0.9.2:8000".to_string(),
        ]);

        let v1 = launcher.launch("app", &descriptor("v1"), 1).await.unwrap();
        assert_eq!(v1.len(), 1);
        assert_eq!(v1[0].address, "10.0.9.1:8000");

        // The second revision gets the remaining endpoint.
        let v2 = launcher.launch("app", &descriptor("v2"), 1).await.unwrap();
        assert_eq!(v2[0].address, "10.0.9.2:8000");

        // All endpoints assigned; a third launch cannot be placed.
        let err = launcher.launch("app", &descriptor("v3"), 1).await;
        assert!(matches!(err, Err(PromoteError::Launch(_))));

        launcher.tear_down("app", v1).await;
        let v3 = launcher.launch("app", &descriptor("v3"), 1).await.unwrap();
        assert_eq!(v3[0].address, "10.0.9.1:8000");
    }

    #[tokio::test]
    async fn rejects_counts_beyond_capacity() {
        let launcher = EndpointLauncher::new(vec!["10.0.9.1:8000".to_string()]);
        let err = launcher.launch("app", &descriptor("v1"), 2).await;
        assert!(matches!(err, Err(PromoteError::Launch(_))));
    }
}
