//! Bounded-wait verification of a standby target group.
//!
//! During the verifying phase the promotion controller needs a single
//! answer within a hard deadline: did every registered target in the
//! standby group come up healthy? Polling is cooperative
//! (`tokio::time::sleep` between checks), never busy, and the timeout
//! transition is deterministic.

use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::debug;

use greenline_traffic::TargetGroup;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("target group {group} did not report healthy within {timeout:?}")]
    Timeout { group: String, timeout: Duration },
}

/// Wait until every registered target in `group` reports healthy.
///
/// Returns `Ok(())` as soon as the group is wholly healthy, or
/// `VerifyError::Timeout` once `timeout` elapses. A zero timeout fails
/// immediately without a single poll — the caller treats that as "the
/// verification window has already closed".
pub async fn verify_group(
    group: &TargetGroup,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<(), VerifyError> {
    let deadline = Instant::now() + timeout;

    loop {
        if timeout.is_zero() {
            break;
        }
        if group.all_healthy() {
            debug!(group = %group.id(), targets = group.target_count(), "group verified healthy");
            return Ok(());
        }
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let remaining = deadline - now;
        sleep(poll_interval.min(remaining)).await;
    }

    Err(VerifyError::Timeout {
        group: group.id().to_string(),
        timeout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenline_core::Protocol;
    use greenline_traffic::{Target, TargetHealth};
    use std::sync::Arc;

    fn group_with_targets(n: u32) -> Arc<TargetGroup> {
        let group = Arc::new(TargetGroup::new("app-green", 8000, Protocol::Http, None));
        for i in 0..n {
            group.register(Target {
                id: format!("task-{i}"),
                address: format!("10.0.2.{i}:8000"),
            });
        }
        group
    }

    #[tokio::test(start_paused = true)]
    async fn verify_succeeds_when_all_healthy() {
        let group = group_with_targets(2);
        group.set_health("task-0", TargetHealth::Healthy).unwrap();
        group.set_health("task-1", TargetHealth::Healthy).unwrap();

        let result = verify_group(&group, Duration::from_secs(5), Duration::from_secs(300)).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn verify_times_out_when_never_healthy() {
        let group = group_with_targets(1);

        let result = verify_group(&group, Duration::from_secs(5), Duration::from_secs(300)).await;
        assert!(matches!(result, Err(VerifyError::Timeout { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn verify_picks_up_late_recovery() {
        let group = group_with_targets(1);

        let verifier = {
            let group = group.clone();
            tokio::spawn(async move {
                verify_group(&group, Duration::from_secs(5), Duration::from_secs(300)).await
            })
        };

        // Target becomes healthy after a few poll intervals.
        tokio::time::sleep(Duration::from_secs(12)).await;
        group.set_health("task-0", TargetHealth::Healthy).unwrap();

        assert!(verifier.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_fails_immediately() {
        let group = group_with_targets(1);
        group.set_health("task-0", TargetHealth::Healthy).unwrap();

        // Even a wholly healthy group fails with a closed window.
        let start = Instant::now();
        let result = verify_group(&group, Duration::from_secs(5), Duration::ZERO).await;
        assert!(matches!(result, Err(VerifyError::Timeout { .. })));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_group_never_verifies() {
        let group = Arc::new(TargetGroup::new("app-green", 8000, Protocol::Http, None));
        let result = verify_group(&group, Duration::from_secs(5), Duration::from_secs(30)).await;
        assert!(result.is_err());
    }
}
