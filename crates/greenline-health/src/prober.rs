//! Background probe loop for a target group.
//!
//! Each exposed service gets one probe loop per target group. The loop
//! probes every registered target on an interval — HTTP when the group
//! carries a health-check path, TCP connect otherwise — feeds results
//! through a `HealthTracker`, and records the thresholded status back
//! into the group.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use greenline_traffic::TargetGroup;

use crate::checker::{HealthTracker, http_probe, tcp_probe};

/// Run the probe loop for one target group until shutdown.
///
/// Trackers are created lazily per target and dropped when the target
/// is deregistered, so a group reused for a new revision starts with a
/// clean slate.
pub async fn run_probe_loop(
    group: Arc<TargetGroup>,
    interval: Duration,
    probe_timeout: Duration,
    unhealthy_threshold: u32,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut trackers: HashMap<String, HealthTracker> = HashMap::new();
    info!(group = %group.id(), ?interval, "probe loop started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => {
                info!(group = %group.id(), "probe loop shutting down");
                return;
            }
        }

        let targets = group.targets();
        trackers.retain(|id, _| targets.iter().any(|t| t.id == *id));

        for target in targets {
            let result = match group.health_check_path() {
                Some(path) => http_probe(&target.address, path, probe_timeout).await,
                None => tcp_probe(&target.address, probe_timeout).await,
            };

            let tracker = trackers
                .entry(target.id.clone())
                .or_insert_with(|| HealthTracker::new(unhealthy_threshold, interval));
            let status = tracker.record(result);

            // The target may have been deregistered mid-probe; that is
            // not an error worth surfacing.
            if group.set_health(&target.id, status).is_err() {
                debug!(group = %group.id(), target = %target.id, "probed a deregistered target");
                trackers.remove(&target.id);
            }
        }
    }
}
