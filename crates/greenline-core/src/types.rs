//! Shared types used across greenline crates.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for an exposed service (e.g. `"db"`, `"app"`).
pub type ServiceId = String;

/// Unique identifier for a promotion attempt.
pub type AttemptId = String;

/// Unique identifier for a target group.
pub type TargetGroupId = String;

/// A fully-qualified container image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Repository path, e.g. `registry.example.com/portfolio/app`.
    pub repository: String,
    /// Image tag, e.g. `v2`.
    pub tag: String,
    /// Content digest, when the registry reported one.
    pub digest: Option<String>,
}

impl ImageRef {
    pub fn new(repository: &str, tag: &str) -> Self {
        Self {
            repository: repository.to_string(),
            tag: tag.to_string(),
            digest: None,
        }
    }

    pub fn with_digest(mut self, digest: &str) -> Self {
        self.digest = Some(digest.to_string());
        self
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.digest {
            Some(d) => write!(f, "{}:{}@{}", self.repository, self.tag, d),
            None => write!(f, "{}:{}", self.repository, self.tag),
        }
    }
}

/// Wire protocol for a listener or target group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Tcp,
    Http,
    Https,
}

/// How a container's health is probed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HealthProbeSpec {
    /// Shell command executed inside the container (exit 0 = healthy).
    Command { command: Vec<String> },
    /// HTTP GET against a path (2xx = healthy).
    HttpPath { path: String },
}

/// A container port mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
    pub protocol: Protocol,
}

/// A named-volume mount inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountPoint {
    pub container_path: String,
    pub source_volume: String,
    pub read_only: bool,
}

/// Resource limits for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// CPU units (1024 = one vCPU).
    pub cpu_units: u32,
    /// Memory limit in MiB.
    pub memory_mib: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu_units: 256,
            memory_mib: 512,
        }
    }
}

/// Portable description of a runnable service revision.
///
/// A descriptor is immutable per deployment: a new image reference
/// produces a new descriptor via [`ServiceDescriptor::with_image`],
/// never an in-place mutation. Environment variables and secret
/// references use `BTreeMap` so serialization is deterministic —
/// generating a descriptor twice from the same live state yields
/// byte-identical documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub image: ImageRef,
    /// The port this service is reachable on.
    pub exposed_port: u16,
    pub health_check: HealthProbeSpec,
    /// Plain environment variables.
    pub env: BTreeMap<String, String>,
    /// env key → field name in the external secret store, resolved at
    /// task start by the secret resolver (out of scope here).
    pub secrets: BTreeMap<String, String>,
    pub mounts: Vec<MountPoint>,
    pub port_mappings: Vec<PortMapping>,
    pub resources: ResourceLimits,
    pub working_directory: Option<String>,
    pub command: Option<Vec<String>>,
}

impl ServiceDescriptor {
    /// Derive the descriptor for the next revision: identical in every
    /// field except the image reference.
    pub fn with_image(&self, image: ImageRef) -> Self {
        Self {
            image,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(tag: &str) -> ServiceDescriptor {
        ServiceDescriptor {
            image: ImageRef::new("registry.example.com/portfolio/app", tag),
            exposed_port: 8000,
            health_check: HealthProbeSpec::HttpPath {
                path: "/health".to_string(),
            },
            env: BTreeMap::from([("DEBUG".to_string(), "False".to_string())]),
            secrets: BTreeMap::from([(
                "SECRET_KEY".to_string(),
                "app-secret-key".to_string(),
            )]),
            mounts: vec![],
            port_mappings: vec![PortMapping {
                container_port: 8000,
                host_port: 8000,
                protocol: Protocol::Tcp,
            }],
            resources: ResourceLimits::default(),
            working_directory: Some("/app".to_string()),
            command: None,
        }
    }

    #[test]
    fn image_ref_display() {
        let img = ImageRef::new("repo/app", "v2");
        assert_eq!(img.to_string(), "repo/app:v2");

        let img = img.with_digest("sha256:abcd");
        assert_eq!(img.to_string(), "repo/app:v2@sha256:abcd");
    }

    #[test]
    fn with_image_changes_only_the_image() {
        let v1 = descriptor("v1");
        let v2 = v1.with_image(ImageRef::new("registry.example.com/portfolio/app", "v2"));

        assert_eq!(v2.image.tag, "v2");
        assert_eq!(v2.exposed_port, v1.exposed_port);
        assert_eq!(v2.env, v1.env);
        assert_eq!(v2.secrets, v1.secrets);
        assert_ne!(v1, v2);
    }

    #[test]
    fn descriptor_serialization_is_deterministic() {
        let d = descriptor("v1");
        let a = serde_json::to_string(&d).unwrap();
        let b = serde_json::to_string(&d.clone()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn health_probe_spec_roundtrip() {
        let probe = HealthProbeSpec::Command {
            command: vec!["CMD-SHELL".to_string(), "pg_isready -U postgres".to_string()],
        };
        let json = serde_json::to_string(&probe).unwrap();
        let back: HealthProbeSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(probe, back);
    }
}
