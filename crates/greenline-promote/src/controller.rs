//! Promotion controller — drives the blue/green promotion state machine.
//!
//! One controller exists per exposed service (per listener). It runs a
//! single attempt at a time; image changes arriving mid-attempt are
//! queued and started only once the in-flight attempt reaches a
//! terminal phase, preserving the single-active-group invariant.
//! Controllers for different listeners run independently.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use greenline_core::ServiceDescriptor;
use greenline_descriptor::{DeploymentDescriptor, DescriptorError, generate};
use greenline_health::verify_group;
use greenline_state::{
    AttemptOutcome, AttemptRecord, ServiceStatus, StateStore, TaskSpecRecord, epoch_secs,
};
use greenline_traffic::{BlueGreenExposure, Target};

use crate::attempt::{ImageChange, PromotionAttempt, PromotionPhase};
use crate::error::{PromoteError, PromoteResult};

/// Boxed future type used by [`TaskLauncher`] implementations.
pub type BoxFuture<T> = std::pin::Pin<Box<dyn Future<Output = T> + Send>>;

/// Starts and stops tasks for a service revision.
///
/// The production implementation talks to the cluster scheduler; tests
/// substitute fakes. Futures are boxed so the controller can hold the
/// launcher as a trait object.
pub trait TaskLauncher: Send + Sync {
    /// Start `count` tasks running `descriptor` and return their
    /// addresses for target-group registration.
    fn launch(
        &self,
        service: &str,
        descriptor: &ServiceDescriptor,
        count: u32,
    ) -> BoxFuture<PromoteResult<Vec<Target>>>;

    /// Tear down tasks that were deregistered.
    fn tear_down(&self, service: &str, targets: Vec<Target>) -> BoxFuture<()>;
}

/// Promotion controller tuning.
#[derive(Debug, Clone)]
pub struct PromoteConfig {
    /// Verification window for the standby group.
    pub verify_timeout: Duration,
    /// Poll interval during verification.
    pub poll_interval: Duration,
    /// Bounded retry count for inconsistent live state.
    pub invalid_state_retries: u32,
    /// Backoff between those retries.
    pub retry_backoff: Duration,
}

impl Default for PromoteConfig {
    fn default() -> Self {
        Self {
            verify_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(5),
            invalid_state_retries: 3,
            retry_backoff: Duration::from_secs(10),
        }
    }
}

/// Operations the API surface needs from a controller.
pub trait ControllerApi: Send + Sync {
    fn service(&self) -> &str;
    fn submit(&self, change: ImageChange);
    fn cancel(&self) -> bool;
    fn current_attempt(&self) -> Option<PromotionAttempt>;
    fn queued_len(&self) -> usize;
}

/// The per-listener promotion state machine.
pub struct PromotionController {
    service: String,
    exposure: Arc<BlueGreenExposure>,
    store: StateStore,
    launcher: Arc<dyn TaskLauncher>,
    config: PromoteConfig,
    /// Image changes waiting for the in-flight attempt to finish.
    queue: Mutex<VecDeque<ImageChange>>,
    /// The in-flight (or most recently finished) attempt.
    current: RwLock<Option<PromotionAttempt>>,
    /// Cancellation signal for the in-flight attempt.
    cancel: Mutex<Option<watch::Sender<bool>>>,
    notify: Notify,
    seq: AtomicU64,
}

impl PromotionController {
    pub fn new(
        service: &str,
        exposure: Arc<BlueGreenExposure>,
        store: StateStore,
        launcher: Arc<dyn TaskLauncher>,
        config: PromoteConfig,
    ) -> Self {
        Self {
            service: service.to_string(),
            exposure,
            store,
            launcher,
            config,
            queue: Mutex::new(VecDeque::new()),
            current: RwLock::new(None),
            cancel: Mutex::new(None),
            notify: Notify::new(),
            seq: AtomicU64::new(0),
        }
    }

    /// Process queued image changes until shutdown, one attempt at a time.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(service = %self.service, "promotion controller started");
        loop {
            while let Some(change) = self.pop() {
                let record = self.run_attempt(change).await;
                info!(
                    service = %self.service,
                    attempt = %record.id,
                    outcome = ?record.outcome,
                    "attempt finished"
                );
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = shutdown.changed() => {
                    info!(service = %self.service, "promotion controller shutting down");
                    return;
                }
            }
        }
    }

    fn pop(&self) -> Option<ImageChange> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Run one promotion attempt to a terminal phase and archive it.
    pub async fn run_attempt(&self, change: ImageChange) -> AttemptRecord {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("{}-{seq}", self.service);
        let mut attempt = PromotionAttempt::new(&id, &self.service, change, epoch_secs());
        info!(
            attempt = %id,
            service = %self.service,
            image = %attempt.new_image(),
            "promotion attempt started"
        );

        let (cancel_tx, cancel_rx) = watch::channel(false);
        *self.cancel.lock().unwrap() = Some(cancel_tx);
        self.set_phase(&mut attempt, PromotionPhase::Pending);

        self.drive(&mut attempt, cancel_rx).await;
        *self.cancel.lock().unwrap() = None;

        let (outcome, failure_reason) = match &attempt.phase {
            PromotionPhase::Promoted => (AttemptOutcome::Promoted, None),
            PromotionPhase::RolledBack { reason } => {
                (AttemptOutcome::RolledBack, Some(reason.clone()))
            }
            PromotionPhase::Failed { reason } => (AttemptOutcome::Failed, Some(reason.clone())),
            other => (
                AttemptOutcome::Failed,
                Some(format!("attempt ended in non-terminal phase {other:?}")),
            ),
        };

        let record = AttemptRecord {
            id: attempt.id.clone(),
            service: self.service.clone(),
            old_image: attempt.old_image.clone(),
            new_image: attempt.new_image(),
            outcome,
            failure_reason,
            created_at: attempt.created_at,
            finished_at: epoch_secs(),
        };
        if let Err(e) = self.store.put_attempt(&record) {
            error!(attempt = %record.id, error = %e, "failed to archive attempt");
        }
        record
    }

    async fn drive(&self, attempt: &mut PromotionAttempt, mut cancel_rx: watch::Receiver<bool>) {
        // ── Generating ─────────────────────────────────────────────
        self.set_phase(attempt, PromotionPhase::Generating);
        let descriptor = match self.generate_with_retry().await {
            Ok(d) => d,
            Err(e) => {
                self.set_phase(
                    attempt,
                    PromotionPhase::Failed {
                        reason: e.to_string(),
                    },
                );
                return;
            }
        };
        attempt.old_image = Some(descriptor.task_spec.image.clone());

        // A new image reference produces a new descriptor.
        let next = descriptor.task_spec.with_image(attempt.new_image());

        let revision = match self.register_revision(&next) {
            Ok(rev) => rev,
            Err(e) => {
                self.restore_service_status();
                self.set_phase(
                    attempt,
                    PromotionPhase::Failed {
                        reason: e.to_string(),
                    },
                );
                return;
            }
        };

        // ── Promoting ──────────────────────────────────────────────
        self.set_phase(attempt, PromotionPhase::Promoting);
        let standby = self.exposure.standby();

        if descriptor.verify_timeout.is_zero() {
            // The verification window is already closed; register no
            // traffic at all.
            self.set_phase(attempt, PromotionPhase::Verifying);
            self.roll_back(attempt, "verification window is zero".to_string())
                .await;
            return;
        }

        // The standby group still holds the retained prior revision;
        // retention is exactly one attempt back.
        let stale = standby.deregister_all();
        if !stale.is_empty() {
            self.launcher.tear_down(&self.service, stale).await;
        }

        let desired = self.desired_count();
        let targets = match self.launcher.launch(&self.service, &next, desired).await {
            Ok(t) => t,
            Err(e) => {
                self.roll_back(attempt, e.to_string()).await;
                return;
            }
        };
        for target in targets {
            standby.register(target);
        }

        // ── Verifying ──────────────────────────────────────────────
        self.set_phase(attempt, PromotionPhase::Verifying);

        enum VerifyOutcome {
            Healthy,
            TimedOut(PromoteError),
            Cancelled,
        }

        let outcome = tokio::select! {
            res = verify_group(&standby, self.config.poll_interval, descriptor.verify_timeout) => {
                match res {
                    Ok(()) => VerifyOutcome::Healthy,
                    Err(e) => VerifyOutcome::TimedOut(e.into()),
                }
            }
            _ = cancel_rx.changed() => VerifyOutcome::Cancelled,
        };

        match outcome {
            VerifyOutcome::Healthy => match self.exposure.promote() {
                Ok(now_active) => {
                    if let Err(e) = self.store.set_service_revision(&self.service, revision) {
                        error!(service = %self.service, error = %e, "failed to record new revision");
                    }
                    self.set_phase(attempt, PromotionPhase::Promoted);
                    info!(
                        attempt = %attempt.id,
                        active = %now_active,
                        image = %attempt.new_image(),
                        "promotion complete"
                    );
                }
                Err(e) => {
                    self.roll_back(attempt, PromoteError::from(e).to_string())
                        .await;
                }
            },
            VerifyOutcome::TimedOut(e) => {
                self.roll_back(attempt, e.to_string()).await;
            }
            VerifyOutcome::Cancelled => {
                self.roll_back(attempt, "cancelled by operator".to_string())
                    .await;
            }
        }
    }

    /// Revert routing state and tear the standby revision down.
    ///
    /// The listener was never moved on any path that lands here, so
    /// reverting means: deregister whatever this attempt put into the
    /// standby group, and leave the last known-good group serving.
    async fn roll_back(&self, attempt: &mut PromotionAttempt, reason: String) {
        self.set_phase(attempt, PromotionPhase::RollingBack);
        warn!(attempt = %attempt.id, %reason, "rolling back");

        let standby = self.exposure.standby();
        let targets = standby.deregister_all();
        if !targets.is_empty() {
            self.launcher.tear_down(&self.service, targets).await;
        }
        self.restore_service_status();

        self.set_phase(attempt, PromotionPhase::RolledBack { reason });
    }

    async fn generate_with_retry(&self) -> PromoteResult<DeploymentDescriptor> {
        let mut retries_left = self.config.invalid_state_retries;
        loop {
            match generate(&self.store, &self.service, self.config.verify_timeout) {
                Ok(d) => return Ok(d),
                Err(DescriptorError::InvalidState(reason)) if retries_left > 0 => {
                    retries_left -= 1;
                    warn!(
                        service = %self.service,
                        %reason,
                        retries_left,
                        "live state inconsistent, backing off"
                    );
                    sleep(self.config.retry_backoff).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Register the next task spec revision and mark the service
    /// transitioning for the duration of the attempt.
    fn register_revision(&self, descriptor: &ServiceDescriptor) -> PromoteResult<u32> {
        let latest = self.store.latest_task_spec(&self.service)?;
        let revision = latest.map(|s| s.revision).unwrap_or(0) + 1;
        self.store.put_task_spec(&TaskSpecRecord {
            service: self.service.clone(),
            descriptor: descriptor.clone(),
            revision,
            status: "ACTIVE".to_string(),
            registered_at: epoch_secs(),
            registered_by: "greenlined".to_string(),
            compatibilities: vec!["FARGATE".to_string()],
            placement_constraints: vec![],
        })?;
        self.store
            .set_service_status(&self.service, ServiceStatus::Transitioning)?;
        debug!(service = %self.service, revision, "next revision registered");
        Ok(revision)
    }

    fn restore_service_status(&self) {
        if let Err(e) = self
            .store
            .set_service_status(&self.service, ServiceStatus::Stable)
        {
            error!(service = %self.service, error = %e, "failed to restore service status");
        }
    }

    fn desired_count(&self) -> u32 {
        match self.store.get_service(&self.service) {
            Ok(Some(record)) => record.desired_count,
            _ => 1,
        }
    }

    fn set_phase(&self, attempt: &mut PromotionAttempt, phase: PromotionPhase) {
        attempt.phase = phase;
        debug!(attempt = %attempt.id, phase = ?attempt.phase, "phase transition");
        *self.current.write().unwrap() = Some(attempt.clone());
    }
}

impl ControllerApi for PromotionController {
    fn service(&self) -> &str {
        &self.service
    }

    /// Queue an image change. If an attempt is in flight the change
    /// waits its turn; concurrent promotions against the same listener
    /// are forbidden.
    fn submit(&self, change: ImageChange) {
        info!(
            service = %self.service,
            image = %change.image_ref(),
            "image change queued"
        );
        self.queue.lock().unwrap().push_back(change);
        self.notify.notify_one();
    }

    /// Signal cancellation of the in-flight attempt. Returns whether an
    /// attempt was there to cancel.
    fn cancel(&self) -> bool {
        let guard = self.cancel.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => tx.send(true).is_ok(),
            None => false,
        }
    }

    fn current_attempt(&self) -> Option<PromotionAttempt> {
        self.current.read().unwrap().clone()
    }

    fn queued_len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}
