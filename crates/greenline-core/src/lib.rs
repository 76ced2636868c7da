//! greenline-core — shared types and configuration for greenline.
//!
//! greenline is a blue/green promotion control plane for container
//! services: it keeps two parallel target groups per exposed service
//! (active and standby) and shifts listener traffic between them after
//! the standby revision passes health verification.
//!
//! This crate holds the value types shared by every other greenline
//! crate (image references, service descriptors, health probes) and
//! the `greenline.toml` configuration parser.

pub mod config;
pub mod types;

pub use config::{Config, ExposureConfig, PromotionConfig, ServiceConfig, parse_duration};
pub use types::*;
