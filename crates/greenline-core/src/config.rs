//! greenline.toml configuration parser.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{
    HealthProbeSpec, ImageRef, MountPoint, PortMapping, Protocol, ResourceLimits,
    ServiceDescriptor,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub cluster: ClusterConfig,
    pub topology: TopologyConfig,
    #[serde(default)]
    pub promotion: PromotionConfig,
    #[serde(default, rename = "service")]
    pub services: Vec<ServiceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    /// Private DNS namespace for service discovery (e.g. `portfolio.internal`).
    pub discovery_namespace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Which deployment topology to instantiate. Parsed by
    /// `greenline-topology` into its `TopologyKind`.
    pub kind: String,
}

/// Promotion controller tuning, shared by all services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionConfig {
    /// How long a standby group may take to report healthy before the
    /// attempt rolls back (e.g. "5m").
    pub verify_timeout: String,
    /// How often standby health is polled during verification.
    pub poll_interval: String,
    /// Bounded retry count when live state is mid-transition.
    pub invalid_state_retries: u32,
    /// Backoff between those retries.
    pub retry_backoff: String,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            verify_timeout: "5m".to_string(),
            poll_interval: "5s".to_string(),
            invalid_state_retries: 3,
            retry_backoff: "10s".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    /// Image repository watched for new tags.
    pub image_repository: String,
    /// Tag of the initially deployed revision.
    pub tag: String,
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: Protocol,
    #[serde(default = "default_desired_count")]
    pub desired_count: u32,
    pub health: HealthProbeSpec,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
    #[serde(default)]
    pub mounts: Vec<MountPoint>,
    pub resources: Option<ResourceLimits>,
    pub working_directory: Option<String>,
    pub command: Option<Vec<String>>,
    /// Cloud-map style discovery name inside the cluster namespace.
    pub discovery_name: Option<String>,
    /// Addresses (ip:port) where the cluster scheduler runs this
    /// service's tasks. Standby revisions are probed here.
    #[serde(default)]
    pub endpoints: Vec<String>,
    /// Present when the service is exposed through a load balancer.
    pub exposure: Option<ExposureConfig>,
}

fn default_protocol() -> Protocol {
    Protocol::Tcp
}

fn default_desired_count() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureConfig {
    /// "network" (TCP pass-through) or "application" (HTTP, path-checked).
    pub strategy: String,
    pub listener_port: u16,
    /// Health-check path for application exposures.
    pub health_path: Option<String>,
    /// Whether the load balancer faces the internet.
    #[serde(default)]
    pub internet_facing: bool,
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Find the service watching a given image repository.
    pub fn service_for_repository(&self, repository: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.image_repository == repository)
    }

    pub fn verify_timeout(&self) -> Duration {
        parse_duration(&self.promotion.verify_timeout).unwrap_or(Duration::from_secs(300))
    }

    pub fn poll_interval(&self) -> Duration {
        parse_duration(&self.promotion.poll_interval).unwrap_or(Duration::from_secs(5))
    }

    pub fn retry_backoff(&self) -> Duration {
        parse_duration(&self.promotion.retry_backoff).unwrap_or(Duration::from_secs(10))
    }
}

impl ServiceConfig {
    /// Build the descriptor for this service's initially deployed revision.
    pub fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor {
            image: ImageRef::new(&self.image_repository, &self.tag),
            exposed_port: self.port,
            health_check: self.health.clone(),
            env: self.env.clone(),
            secrets: self.secrets.clone(),
            mounts: self.mounts.clone(),
            port_mappings: vec![PortMapping {
                container_port: self.port,
                host_port: self.port,
                protocol: self.protocol,
            }],
            resources: self.resources.unwrap_or_default(),
            working_directory: self.working_directory.clone(),
            command: self.command.clone(),
        }
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[cluster]
name = "portfolio"
discovery_namespace = "portfolio.internal"

[topology]
kind = "blue_green_with_proxy"

[promotion]
verify_timeout = "5m"
poll_interval = "5s"
invalid_state_retries = 3
retry_backoff = "10s"

[[service]]
name = "db"
image_repository = "registry.example.com/portfolio/db"
tag = "v1"
port = 5432
protocol = "tcp"
discovery_name = "db"
endpoints = ["10.0.2.11:5432"]

[service.health]
type = "command"
command = ["CMD-SHELL", "pg_isready -U postgres"]

[service.secrets]
POSTGRES_PASSWORD = "db-password"

[[service.mounts]]
container_path = "/var/lib/postgresql/data"
source_volume = "db-volume"
read_only = false

[service.exposure]
strategy = "network"
listener_port = 5432

[[service]]
name = "app"
image_repository = "registry.example.com/portfolio/app"
tag = "v1"
port = 8000
protocol = "http"
working_directory = "/app"
discovery_name = "app"
endpoints = ["10.0.2.21:8000"]

[service.health]
type = "http_path"
path = "/health"

[service.env]
DEBUG = "False"
DB_HOST = "db.portfolio.internal"

[service.secrets]
SECRET_KEY = "app-secret-key"
DB_PASSWORD = "db-password"

[service.exposure]
strategy = "application"
listener_port = 80
health_path = "/health"
internet_facing = true
"#;

    #[test]
    fn parse_full_config() {
        let config: Config = toml::from_str(FULL).unwrap();
        assert_eq!(config.cluster.name, "portfolio");
        assert_eq!(config.topology.kind, "blue_green_with_proxy");
        assert_eq!(config.services.len(), 2);

        let db = config.service("db").unwrap();
        assert_eq!(db.port, 5432);
        assert!(matches!(db.health, HealthProbeSpec::Command { .. }));
        assert_eq!(db.exposure.as_ref().unwrap().strategy, "network");

        let app = config.service("app").unwrap();
        assert_eq!(app.env["DB_HOST"], "db.portfolio.internal");
        assert_eq!(app.secrets.len(), 2);
        assert!(app.exposure.as_ref().unwrap().internet_facing);
    }

    #[test]
    fn parse_minimal_config() {
        let toml_str = r#"
[cluster]
name = "test"

[topology]
kind = "single_stage"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.services.is_empty());
        assert_eq!(config.promotion.invalid_state_retries, 3);
        assert_eq!(config.verify_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn service_lookup_by_repository() {
        let config: Config = toml::from_str(FULL).unwrap();
        let svc = config
            .service_for_repository("registry.example.com/portfolio/app")
            .unwrap();
        assert_eq!(svc.name, "app");
        assert!(config.service_for_repository("registry.example.com/other").is_none());
    }

    #[test]
    fn descriptor_from_service_config() {
        let config: Config = toml::from_str(FULL).unwrap();
        let desc = config.service("app").unwrap().descriptor();
        assert_eq!(desc.image.tag, "v1");
        assert_eq!(desc.exposed_port, 8000);
        assert_eq!(desc.secrets["SECRET_KEY"], "app-secret-key");
        assert_eq!(desc.resources, ResourceLimits::default());
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("x"), None);
    }
}
