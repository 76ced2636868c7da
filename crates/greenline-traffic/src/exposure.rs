//! Blue/green exposure — a listener plus its two interchangeable
//! target groups, in one of two strategy variants.
//!
//! Both variants expose the same capability set — active group, standby
//! group, promote — so the promotion controller never branches on the
//! strategy. The variant only decides protocols and how targets are
//! health-checked:
//!
//! - **Network**: TCP pass-through listener, connect-level checks.
//!   Used for internal services (the database).
//! - **Application**: HTTP listener with a path health check,
//!   optionally internet-facing. Used for the app/proxy tier.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use greenline_core::{Protocol, ServiceId, TargetGroupId};

use crate::error::{TrafficError, TrafficResult};
use crate::group::TargetGroup;
use crate::listener::Listener;

/// Which flavor of load balancer fronts the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ExposureStrategy {
    /// Network load balancer: TCP listener, port-level health.
    Network,
    /// Application load balancer: HTTP listener, path-level health.
    Application { health_path: String },
}

impl ExposureStrategy {
    fn listener_protocol(&self) -> Protocol {
        match self {
            ExposureStrategy::Network => Protocol::Tcp,
            ExposureStrategy::Application { .. } => Protocol::Http,
        }
    }

    fn health_check_path(&self) -> Option<String> {
        match self {
            ExposureStrategy::Network => None,
            ExposureStrategy::Application { health_path } => Some(health_path.clone()),
        }
    }
}

/// A service's blue/green exposure: one listener, two target groups.
///
/// Group 0 is "blue", group 1 is "green". Roles (active/standby) are
/// derived from the listener's default index, and swap on each
/// successful promotion.
pub struct BlueGreenExposure {
    service: ServiceId,
    strategy: ExposureStrategy,
    listener: Listener,
    groups: [Arc<TargetGroup>; 2],
}

impl BlueGreenExposure {
    pub fn new(
        service: &str,
        listener_port: u16,
        target_port: u16,
        strategy: ExposureStrategy,
    ) -> Self {
        let protocol = strategy.listener_protocol();
        let health_path = strategy.health_check_path();
        let blue = Arc::new(TargetGroup::new(
            &format!("{service}-blue"),
            target_port,
            protocol,
            health_path.clone(),
        ));
        let green = Arc::new(TargetGroup::new(
            &format!("{service}-green"),
            target_port,
            protocol,
            health_path,
        ));
        Self {
            service: service.to_string(),
            strategy,
            listener: Listener::new(listener_port, protocol),
            groups: [blue, green],
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn strategy(&self) -> &ExposureStrategy {
        &self.strategy
    }

    pub fn listener(&self) -> &Listener {
        &self.listener
    }

    /// The group currently receiving all listener traffic.
    pub fn active(&self) -> Arc<TargetGroup> {
        self.groups[self.listener.default_index()].clone()
    }

    /// The idle group, warmed and verified before each promotion. After
    /// a successful promotion it retains the previous known-good
    /// revision as the rollback target.
    pub fn standby(&self) -> Arc<TargetGroup> {
        self.groups[self.listener.default_index() ^ 1].clone()
    }

    /// Identity of the group the listener currently defaults to.
    pub fn current_default(&self) -> TargetGroupId {
        self.active().id().to_string()
    }

    /// Shift all listener traffic to the standby group.
    ///
    /// Rejected when the standby group is empty — the listener never
    /// points at a group with nothing registered. On success the roles
    /// swap and the id of the newly active group is returned.
    pub fn promote(&self) -> TrafficResult<TargetGroupId> {
        let standby = self.standby();
        if standby.target_count() == 0 {
            return Err(TrafficError::EmptyStandby(standby.id().to_string()));
        }
        self.listener.swap_default();
        let now_active = self.current_default();
        info!(
            service = %self.service,
            active = %now_active,
            "listener traffic shifted"
        );
        Ok(now_active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::Target;

    fn exposure() -> BlueGreenExposure {
        BlueGreenExposure::new(
            "app",
            80,
            8000,
            ExposureStrategy::Application {
                health_path: "/health".to_string(),
            },
        )
    }

    fn target(n: u32) -> Target {
        Target {
            id: format!("task-{n}"),
            address: format!("10.0.2.{n}:8000"),
        }
    }

    #[test]
    fn blue_is_active_initially() {
        let e = exposure();
        assert_eq!(e.current_default(), "app-blue");
        assert_eq!(e.standby().id(), "app-green");
    }

    #[test]
    fn promote_swaps_roles() {
        let e = exposure();
        e.standby().register(target(1));

        let now_active = e.promote().unwrap();
        assert_eq!(now_active, "app-green");
        assert_eq!(e.current_default(), "app-green");
        // Former active becomes the standby / rollback target.
        assert_eq!(e.standby().id(), "app-blue");
    }

    #[test]
    fn promote_rejects_empty_standby() {
        let e = exposure();
        let err = e.promote().unwrap_err();
        assert!(matches!(err, TrafficError::EmptyStandby(_)));
        // Routing unchanged.
        assert_eq!(e.current_default(), "app-blue");
    }

    #[test]
    fn network_strategy_uses_tcp_and_no_path() {
        let e = BlueGreenExposure::new("db", 5432, 5432, ExposureStrategy::Network);
        assert_eq!(e.listener().protocol(), Protocol::Tcp);
        assert!(e.active().health_check_path().is_none());
    }

    #[test]
    fn application_strategy_sets_health_path() {
        let e = exposure();
        assert_eq!(e.listener().protocol(), Protocol::Http);
        assert_eq!(e.active().health_check_path(), Some("/health"));
        assert_eq!(e.standby().health_check_path(), Some("/health"));
    }

    #[test]
    fn strategy_serializes_tagged() {
        let s = ExposureStrategy::Application {
            health_path: "/health".to_string(),
        };
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"strategy\":\"application\""));
        let back: ExposureStrategy = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }
}
