//! Daemon bootstrap: state seeding and per-service runtime assembly.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, bail};
use tracing::{info, warn};

use greenline_core::{Config, ExposureConfig, ServiceConfig};
use greenline_promote::{PromoteConfig, PromotionController, TaskLauncher};
use greenline_state::{
    ServiceRecord, ServiceStatus, StateStore, TaskSpecRecord, epoch_secs,
};
use greenline_topology::BuildPlan;
use greenline_traffic::{BlueGreenExposure, ExposureStrategy};

use crate::launcher::EndpointLauncher;

/// Everything the daemon runs for one exposed service.
pub struct ServiceRuntime {
    pub exposure: Arc<BlueGreenExposure>,
    pub controller: Arc<PromotionController>,
}

/// Create service and task-spec records for configured services that
/// the store has never seen. Records that already exist are left
/// untouched; restarts must not reset revisions.
pub fn seed_state(store: &StateStore, config: &Config) -> anyhow::Result<()> {
    for service in &config.services {
        if store.get_service(&service.name)?.is_some() {
            continue;
        }
        let now = epoch_secs();
        store.put_task_spec(&TaskSpecRecord {
            service: service.name.clone(),
            descriptor: service.descriptor(),
            revision: 1,
            status: "ACTIVE".to_string(),
            registered_at: now,
            registered_by: "greenlined".to_string(),
            compatibilities: vec!["FARGATE".to_string()],
            placement_constraints: vec![],
        })?;
        store.put_service(&ServiceRecord {
            id: service.name.clone(),
            cluster: config.cluster.name.clone(),
            image_repository: service.image_repository.clone(),
            container_name: service.name.clone(),
            container_port: service.port,
            desired_count: service.desired_count,
            discovery_name: service.discovery_name.clone(),
            task_spec_revision: 1,
            status: ServiceStatus::Stable,
            created_at: now,
            updated_at: now,
        })?;
        info!(service = %service.name, tag = %service.tag, "service seeded");
    }
    Ok(())
}

fn exposure_strategy(exposure: &ExposureConfig) -> anyhow::Result<ExposureStrategy> {
    match exposure.strategy.as_str() {
        "network" => Ok(ExposureStrategy::Network),
        "application" => Ok(ExposureStrategy::Application {
            health_path: exposure
                .health_path
                .clone()
                .unwrap_or_else(|| "/health".to_string()),
        }),
        other => bail!("unknown exposure strategy: {other}"),
    }
}

/// Assemble exposure, launcher, and controller for every service the
/// build plan exposes, and put the initial revision's tasks into the
/// active group.
pub async fn build_runtimes(
    config: &Config,
    plan: &BuildPlan,
    store: &StateStore,
    promote: &PromoteConfig,
) -> anyhow::Result<HashMap<String, ServiceRuntime>> {
    let mut runtimes = HashMap::new();
    for service in &config.services {
        let exposure_name = format!("{}-exposure", service.name);
        if plan.node(&exposure_name).is_none() {
            continue;
        }
        let exposure_cfg = service
            .exposure
            .as_ref()
            .with_context(|| format!("service {} has no exposure config", service.name))?;
        let strategy = exposure_strategy(exposure_cfg)?;
        let exposure = Arc::new(BlueGreenExposure::new(
            &service.name,
            exposure_cfg.listener_port,
            service.port,
            strategy,
        ));

        let launcher = Arc::new(EndpointLauncher::new(service.endpoints.clone()));
        seed_active_group(service, &exposure, launcher.as_ref()).await;

        let controller = Arc::new(PromotionController::new(
            &service.name,
            exposure.clone(),
            store.clone(),
            launcher,
            promote.clone(),
        ));
        runtimes.insert(
            service.name.clone(),
            ServiceRuntime {
                exposure,
                controller,
            },
        );
    }
    Ok(runtimes)
}

/// Launch the currently deployed revision into the active group. The
/// probe loop flips its targets healthy once they respond.
async fn seed_active_group(
    service: &ServiceConfig,
    exposure: &BlueGreenExposure,
    launcher: &EndpointLauncher,
) {
    if service.endpoints.is_empty() {
        warn!(
            service = %service.name,
            "no task endpoints configured; active group starts empty"
        );
        return;
    }
    match launcher
        .launch(&service.name, &service.descriptor(), service.desired_count)
        .await
    {
        Ok(targets) => {
            let active = exposure.active();
            let count = targets.len();
            for target in targets {
                active.register(target);
            }
            info!(
                service = %service.name,
                group = %active.id(),
                targets = count,
                "active group seeded"
            );
        }
        Err(e) => {
            warn!(service = %service.name, error = %e, "seeding active group failed");
        }
    }
}
