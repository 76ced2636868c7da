//! Build-plan derivation.
//!
//! Historically each topology variant was a separate, near-duplicate
//! resource definition. Here the variants collapse into one selector:
//! the config names a `TopologyKind`, and `plan` emits only the nodes
//! that kind needs. Foundation resources (network, secrets, volumes,
//! discovery) come before services, services before their exposures,
//! exposures before the promotion pipeline.

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use greenline_core::{Config, ServiceConfig};

use crate::error::{TopologyError, TopologyResult};

/// Which deployment topology to instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyKind {
    /// Replace tasks in place; no standby group, no pipeline.
    SingleStage,
    /// Blue/green target groups behind network listeners.
    BlueGreen,
    /// Blue/green with an internet-facing proxy tier in front.
    BlueGreenWithProxy,
}

impl TopologyKind {
    fn has_pipeline(self) -> bool {
        !matches!(self, TopologyKind::SingleStage)
    }

    fn has_proxy_tier(self) -> bool {
        matches!(self, TopologyKind::BlueGreenWithProxy)
    }
}

impl FromStr for TopologyKind {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_stage" => Ok(TopologyKind::SingleStage),
            "blue_green" => Ok(TopologyKind::BlueGreen),
            "blue_green_with_proxy" => Ok(TopologyKind::BlueGreenWithProxy),
            other => Err(TopologyError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Network,
    Secret,
    Volume,
    Discovery,
    Service,
    Exposure,
    Pipeline,
}

/// One resource the topology instantiates, with the resources that
/// must exist before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub name: String,
    pub kind: NodeKind,
    pub depends_on: Vec<String>,
}

impl ResourceNode {
    fn new(name: impl Into<String>, kind: NodeKind, depends_on: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            depends_on,
        }
    }
}

/// The resources a topology instantiates, as a dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildPlan {
    pub topology: TopologyKind,
    pub nodes: Vec<ResourceNode>,
}

impl BuildPlan {
    pub fn node(&self, name: &str) -> Option<&ResourceNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn services(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.iter().filter(|n| n.kind == NodeKind::Service)
    }

    /// Dependency-respecting order over the plan's nodes.
    ///
    /// The order is deterministic for a given plan: among nodes whose
    /// dependencies are all placed, declaration order wins. A node
    /// naming a dependency outside the plan, or a cycle, is an error.
    pub fn ordered(&self) -> TopologyResult<Vec<&ResourceNode>> {
        let names: HashSet<&str> = self.nodes.iter().map(|n| n.name.as_str()).collect();
        for node in &self.nodes {
            for dep in &node.depends_on {
                if !names.contains(dep.as_str()) {
                    return Err(TopologyError::UnknownDependency {
                        node: node.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        let mut placed: HashSet<&str> = HashSet::new();
        let mut order: Vec<&ResourceNode> = Vec::with_capacity(self.nodes.len());
        while order.len() < self.nodes.len() {
            let before = order.len();
            for node in &self.nodes {
                if placed.contains(node.name.as_str()) {
                    continue;
                }
                if node.depends_on.iter().all(|d| placed.contains(d.as_str())) {
                    placed.insert(node.name.as_str());
                    order.push(node);
                }
            }
            if order.len() == before {
                let stuck: Vec<&str> = self
                    .nodes
                    .iter()
                    .map(|n| n.name.as_str())
                    .filter(|n| !placed.contains(n))
                    .collect();
                return Err(TopologyError::DependencyCycle(stuck.join(", ")));
            }
        }
        Ok(order)
    }
}

/// Derive the build plan for the topology the config selects.
pub fn plan(config: &Config) -> TopologyResult<BuildPlan> {
    let topology: TopologyKind = config.topology.kind.parse()?;

    // The proxy tier is the application-strategy exposure; other
    // topologies route straight to the backing service.
    let services: Vec<&ServiceConfig> = config
        .services
        .iter()
        .filter(|s| topology.has_proxy_tier() || !is_proxy_tier(s))
        .collect();

    let mut nodes = vec![ResourceNode::new("network", NodeKind::Network, vec![])];

    if config.cluster.discovery_namespace.is_some() {
        nodes.push(ResourceNode::new(
            "discovery",
            NodeKind::Discovery,
            vec!["network".to_string()],
        ));
    }

    for service in &services {
        if !service.secrets.is_empty() {
            nodes.push(ResourceNode::new(
                format!("{}-secrets", service.name),
                NodeKind::Secret,
                vec![],
            ));
        }
        for mount in &service.mounts {
            nodes.push(ResourceNode::new(
                mount.source_volume.clone(),
                NodeKind::Volume,
                vec![],
            ));
        }
    }

    for service in &services {
        let mut deps = vec!["network".to_string()];
        if !service.secrets.is_empty() {
            deps.push(format!("{}-secrets", service.name));
        }
        for mount in &service.mounts {
            deps.push(mount.source_volume.clone());
        }
        if service.discovery_name.is_some() && config.cluster.discovery_namespace.is_some() {
            deps.push("discovery".to_string());
        }
        // A service whose environment points at another service's
        // discovery name starts after it.
        for other in &services {
            if other.name == service.name {
                continue;
            }
            if let Some(discovery) = &other.discovery_name {
                if service.env.values().any(|v| v.contains(discovery.as_str())) {
                    deps.push(other.name.clone());
                }
            }
        }
        nodes.push(ResourceNode::new(
            service.name.clone(),
            NodeKind::Service,
            deps,
        ));
    }

    let mut exposure_names = Vec::new();
    for service in &services {
        if service.exposure.is_some() {
            let name = format!("{}-exposure", service.name);
            nodes.push(ResourceNode::new(
                name.clone(),
                NodeKind::Exposure,
                vec!["network".to_string(), service.name.clone()],
            ));
            exposure_names.push(name);
        }
    }

    if topology.has_pipeline() && !exposure_names.is_empty() {
        nodes.push(ResourceNode::new(
            "pipeline",
            NodeKind::Pipeline,
            exposure_names,
        ));
    }

    let plan = BuildPlan { topology, nodes };
    // Surface ordering problems at plan time, not at daemon start.
    let order = plan.ordered()?;
    debug!(
        topology = ?plan.topology,
        nodes = plan.nodes.len(),
        order = ?order.iter().map(|n| n.name.as_str()).collect::<Vec<_>>(),
        "build plan derived"
    );
    Ok(plan)
}

fn is_proxy_tier(service: &ServiceConfig) -> bool {
    service
        .exposure
        .as_ref()
        .is_some_and(|e| e.strategy == "application")
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenline_core::Config;

    const CONFIG: &str = r#"
[cluster]
name = "portfolio"
discovery_namespace = "portfolio.internal"

[topology]
kind = "blue_green_with_proxy"

[[service]]
name = "db"
image_repository = "registry.example.com/portfolio/db"
tag = "v1"
port = 5432
discovery_name = "db"
health = { type = "command", command = ["pg_isready", "-U", "postgres"] }
secrets = { POSTGRES_PASSWORD = "portfolio/db-password" }
mounts = [{ source_volume = "db-volume", container_path = "/var/lib/postgresql/data", read_only = false }]

[[service]]
name = "app"
image_repository = "registry.example.com/portfolio/app"
tag = "v1"
port = 8000
discovery_name = "app"
health = { type = "http_path", path = "/health" }
env = { DB_HOST = "db.portfolio.internal" }

[service.exposure]
strategy = "network"
listener_port = 8000

[[service]]
name = "proxy"
image_repository = "registry.example.com/portfolio/proxy"
tag = "v1"
port = 443
protocol = "https"
health = { type = "http_path", path = "/health" }

[service.exposure]
strategy = "application"
listener_port = 443
health_path = "/health"
internet_facing = true
"#;

    fn config(kind: &str) -> Config {
        let toml = CONFIG.replace("blue_green_with_proxy", kind);
        toml::from_str(&toml).unwrap()
    }

    fn position(order: &[&ResourceNode], name: &str) -> usize {
        order
            .iter()
            .position(|n| n.name == name)
            .unwrap_or_else(|| panic!("{name} missing from order"))
    }

    #[test]
    fn kind_parses() {
        assert_eq!(
            "single_stage".parse::<TopologyKind>().unwrap(),
            TopologyKind::SingleStage
        );
        assert_eq!(
            "blue_green".parse::<TopologyKind>().unwrap(),
            TopologyKind::BlueGreen
        );
        assert!(matches!(
            "canary".parse::<TopologyKind>(),
            Err(TopologyError::UnknownKind(_))
        ));
    }

    #[test]
    fn full_topology_orders_foundation_first() {
        let plan = plan(&config("blue_green_with_proxy")).unwrap();
        let order = plan.ordered().unwrap();

        assert!(position(&order, "network") < position(&order, "db"));
        assert!(position(&order, "db-secrets") < position(&order, "db"));
        assert!(position(&order, "db-volume") < position(&order, "db"));
        assert!(position(&order, "discovery") < position(&order, "app"));
        // app's DB_HOST points at db's discovery name.
        assert!(position(&order, "db") < position(&order, "app"));
        assert!(position(&order, "app") < position(&order, "app-exposure"));
        assert!(position(&order, "app-exposure") < position(&order, "pipeline"));
        assert!(position(&order, "proxy-exposure") < position(&order, "pipeline"));
    }

    #[test]
    fn single_stage_has_no_pipeline() {
        let plan = plan(&config("single_stage")).unwrap();
        assert!(plan.node("pipeline").is_none());
        // The proxy tier is only built when the topology asks for it.
        assert!(plan.node("proxy").is_none());
        assert!(plan.node("app-exposure").is_some());
    }

    #[test]
    fn blue_green_keeps_pipeline_but_drops_proxy() {
        let plan = plan(&config("blue_green")).unwrap();
        assert!(plan.node("pipeline").is_some());
        assert!(plan.node("proxy").is_none());
        assert_eq!(plan.services().count(), 2);
    }

    #[test]
    fn proxy_tier_included_when_selected() {
        let plan = plan(&config("blue_green_with_proxy")).unwrap();
        assert!(plan.node("proxy").is_some());
        assert!(plan.node("proxy-exposure").is_some());
        assert_eq!(plan.services().count(), 3);
    }

    #[test]
    fn cycle_is_detected() {
        let plan = BuildPlan {
            topology: TopologyKind::BlueGreen,
            nodes: vec![
                ResourceNode::new("a", NodeKind::Service, vec!["b".to_string()]),
                ResourceNode::new("b", NodeKind::Service, vec!["a".to_string()]),
            ],
        };
        assert!(matches!(
            plan.ordered(),
            Err(TopologyError::DependencyCycle(_))
        ));
    }

    #[test]
    fn unknown_dependency_is_an_error() {
        let plan = BuildPlan {
            topology: TopologyKind::BlueGreen,
            nodes: vec![ResourceNode::new(
                "app",
                NodeKind::Service,
                vec!["ghost".to_string()],
            )],
        };
        assert!(matches!(
            plan.ordered(),
            Err(TopologyError::UnknownDependency { .. })
        ));
    }
}
