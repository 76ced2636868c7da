//! Health check probe logic.
//!
//! Performs HTTP or TCP health checks against target addresses with
//! configurable thresholds and exponential backoff.

use std::time::Duration;

use tracing::{debug, warn};

use greenline_traffic::TargetHealth;

/// Result of a single health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// The health endpoint returned 2xx (or the TCP connect succeeded).
    Healthy,
    /// The health endpoint returned non-2xx.
    Unhealthy,
    /// The probe could not be executed (connection error, timeout).
    Failed,
}

/// Tracks consecutive probe results for a single target.
#[derive(Debug)]
pub struct HealthTracker {
    /// Current health status.
    status: TargetHealth,
    /// Consecutive failure count.
    consecutive_failures: u32,
    /// Consecutive success count (for recovery).
    consecutive_successes: u32,
    /// Threshold before marking unhealthy.
    unhealthy_threshold: u32,
    /// Successes needed to recover from unhealthy.
    healthy_threshold: u32,
    /// Current backoff interval.
    current_backoff: Duration,
    /// Base check interval.
    base_interval: Duration,
    /// Maximum backoff.
    max_backoff: Duration,
}

impl HealthTracker {
    pub fn new(unhealthy_threshold: u32, interval: Duration) -> Self {
        Self::with_thresholds(unhealthy_threshold, 1, interval)
    }

    /// Create a tracker with custom thresholds.
    pub fn with_thresholds(
        unhealthy_threshold: u32,
        healthy_threshold: u32,
        interval: Duration,
    ) -> Self {
        Self {
            status: TargetHealth::Unknown,
            consecutive_failures: 0,
            consecutive_successes: 0,
            unhealthy_threshold,
            healthy_threshold,
            current_backoff: interval,
            base_interval: interval,
            max_backoff: Duration::from_secs(60),
        }
    }

    /// Record a probe result and return the new health status.
    pub fn record(&mut self, result: ProbeResult) -> TargetHealth {
        match result {
            ProbeResult::Healthy => {
                self.consecutive_failures = 0;
                self.consecutive_successes += 1;
                self.current_backoff = self.base_interval;

                if self.consecutive_successes >= self.healthy_threshold {
                    if self.status != TargetHealth::Healthy {
                        debug!(
                            successes = self.consecutive_successes,
                            "target recovered to healthy"
                        );
                    }
                    self.status = TargetHealth::Healthy;
                }
            }
            ProbeResult::Unhealthy | ProbeResult::Failed => {
                self.consecutive_successes = 0;
                self.consecutive_failures += 1;

                // Exponential backoff: double the interval up to max.
                self.current_backoff = (self.current_backoff * 2).min(self.max_backoff);

                if self.consecutive_failures >= self.unhealthy_threshold {
                    if self.status != TargetHealth::Unhealthy {
                        warn!(
                            failures = self.consecutive_failures,
                            threshold = self.unhealthy_threshold,
                            "target marked unhealthy"
                        );
                    }
                    self.status = TargetHealth::Unhealthy;
                }
            }
        }

        self.status
    }

    /// Current health status.
    pub fn status(&self) -> TargetHealth {
        self.status
    }

    /// Current number of consecutive failures.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Current backoff interval before the next check.
    pub fn next_interval(&self) -> Duration {
        self.current_backoff
    }
}

/// Perform an HTTP health probe against an endpoint.
///
/// Returns `Healthy` if the response is 2xx, `Unhealthy` for non-2xx,
/// or `Failed` if the connection fails or times out.
pub async fn http_probe(address: &str, path: &str, timeout: Duration) -> ProbeResult {
    let uri = format!("http://{address}{path}");

    let result = tokio::time::timeout(timeout, async {
        let stream = match tokio::net::TcpStream::connect(address).await {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, %uri, "health probe connection failed");
                return ProbeResult::Failed;
            }
        };

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, %uri, "health probe handshake failed");
                return ProbeResult::Failed;
            }
        };

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(&uri)
            .header("host", address)
            .header("user-agent", "greenline-health/0.1")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
            .unwrap();

        match sender.send_request(req).await {
            Ok(resp) => {
                if resp.status().is_success() {
                    ProbeResult::Healthy
                } else {
                    debug!(status = %resp.status(), %uri, "health probe non-2xx");
                    ProbeResult::Unhealthy
                }
            }
            Err(e) => {
                debug!(error = %e, %uri, "health probe request failed");
                ProbeResult::Failed
            }
        }
    })
    .await;

    match result {
        Ok(probe) => probe,
        Err(_) => {
            debug!(%uri, "health probe timed out");
            ProbeResult::Failed
        }
    }
}

/// Perform a TCP connect probe against an address.
///
/// Network exposures have no HTTP path to check; a completed TCP
/// handshake within the timeout counts as healthy.
pub async fn tcp_probe(address: &str, timeout: Duration) -> ProbeResult {
    match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(address)).await {
        Ok(Ok(_)) => ProbeResult::Healthy,
        Ok(Err(e)) => {
            debug!(error = %e, %address, "tcp probe connection failed");
            ProbeResult::Failed
        }
        Err(_) => {
            debug!(%address, "tcp probe timed out");
            ProbeResult::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_starts_unknown() {
        let tracker = HealthTracker::new(3, Duration::from_secs(5));
        assert_eq!(tracker.status(), TargetHealth::Unknown);
        assert_eq!(tracker.consecutive_failures(), 0);
    }

    #[test]
    fn tracker_becomes_healthy_on_first_success() {
        let mut tracker = HealthTracker::new(3, Duration::from_secs(5));
        let status = tracker.record(ProbeResult::Healthy);
        assert_eq!(status, TargetHealth::Healthy);
    }

    #[test]
    fn tracker_stays_healthy_under_threshold() {
        let mut tracker = HealthTracker::new(3, Duration::from_secs(5));
        tracker.record(ProbeResult::Healthy);

        // Two failures — under threshold of 3.
        tracker.record(ProbeResult::Unhealthy);
        tracker.record(ProbeResult::Unhealthy);
        assert_eq!(tracker.status(), TargetHealth::Healthy);
        assert_eq!(tracker.consecutive_failures(), 2);
    }

    #[test]
    fn tracker_becomes_unhealthy_at_threshold() {
        let mut tracker = HealthTracker::new(3, Duration::from_secs(5));
        tracker.record(ProbeResult::Healthy);

        tracker.record(ProbeResult::Unhealthy);
        tracker.record(ProbeResult::Unhealthy);
        let status = tracker.record(ProbeResult::Unhealthy);
        assert_eq!(status, TargetHealth::Unhealthy);
    }

    #[test]
    fn tracker_recovers_on_success() {
        let mut tracker = HealthTracker::new(3, Duration::from_secs(5));

        for _ in 0..3 {
            tracker.record(ProbeResult::Unhealthy);
        }
        assert_eq!(tracker.status(), TargetHealth::Unhealthy);

        let status = tracker.record(ProbeResult::Healthy);
        assert_eq!(status, TargetHealth::Healthy);
    }

    #[test]
    fn tracker_failed_counts_as_failure() {
        let mut tracker = HealthTracker::new(3, Duration::from_secs(5));
        tracker.record(ProbeResult::Healthy);

        tracker.record(ProbeResult::Failed);
        tracker.record(ProbeResult::Failed);
        tracker.record(ProbeResult::Failed);
        assert_eq!(tracker.status(), TargetHealth::Unhealthy);
    }

    #[test]
    fn tracker_exponential_backoff() {
        let mut tracker = HealthTracker::with_thresholds(3, 1, Duration::from_secs(1));

        assert_eq!(tracker.next_interval(), Duration::from_secs(1));

        tracker.record(ProbeResult::Unhealthy);
        assert_eq!(tracker.next_interval(), Duration::from_secs(2));

        tracker.record(ProbeResult::Unhealthy);
        assert_eq!(tracker.next_interval(), Duration::from_secs(4));
    }

    #[test]
    fn tracker_backoff_caps_and_resets() {
        let mut tracker = HealthTracker::with_thresholds(100, 1, Duration::from_secs(1));

        for _ in 0..10 {
            tracker.record(ProbeResult::Failed);
        }
        assert_eq!(tracker.next_interval(), Duration::from_secs(60));

        tracker.record(ProbeResult::Healthy);
        assert_eq!(tracker.next_interval(), Duration::from_secs(1));
    }

    #[test]
    fn custom_healthy_threshold() {
        let mut tracker = HealthTracker::with_thresholds(2, 3, Duration::from_secs(1));

        tracker.record(ProbeResult::Unhealthy);
        tracker.record(ProbeResult::Unhealthy);
        assert_eq!(tracker.status(), TargetHealth::Unhealthy);

        // Needs 3 successes to recover.
        tracker.record(ProbeResult::Healthy);
        tracker.record(ProbeResult::Healthy);
        assert_eq!(tracker.status(), TargetHealth::Unhealthy);
        tracker.record(ProbeResult::Healthy);
        assert_eq!(tracker.status(), TargetHealth::Healthy);
    }

    #[tokio::test]
    async fn tcp_probe_fails_on_refused_connection() {
        // Port 1 on localhost should refuse immediately.
        let result = tcp_probe("127.0.0.1:1", Duration::from_millis(500)).await;
        assert_eq!(result, ProbeResult::Failed);
    }

    #[tokio::test]
    async fn tcp_probe_succeeds_against_listening_socket() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let result = tcp_probe(&addr.to_string(), Duration::from_secs(1)).await;
        assert_eq!(result, ProbeResult::Healthy);
    }
}
