//! Promotion attempt lifecycle.

use serde::{Deserialize, Serialize};

use greenline_core::{AttemptId, ImageRef, ServiceId};

/// An image-registry change notification — the event that triggers a
/// promotion attempt for the watching service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageChange {
    /// Repository the new image was pushed to.
    pub repository: String,
    pub tag: String,
    pub digest: Option<String>,
}

impl ImageChange {
    pub fn image_ref(&self) -> ImageRef {
        let image = ImageRef::new(&self.repository, &self.tag);
        match &self.digest {
            Some(d) => image.with_digest(d),
            None => image,
        }
    }
}

/// Phase of a promotion attempt.
///
/// ```text
/// Pending → Generating → Promoting → Verifying → Promoted
///               │            │           │
///               ▼            ▼           ▼
///            Failed     RollingBack → RolledBack
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromotionPhase {
    /// Created, waiting for its turn on this listener.
    Pending,
    /// Deriving the deployment descriptor from live state.
    Generating,
    /// Warming the standby group with the new revision's tasks.
    Promoting,
    /// Waiting for the standby group to report wholly healthy.
    Verifying,
    /// Traffic shifted; the former standby is now active (terminal).
    Promoted,
    /// Deregistering and tearing down the standby revision.
    RollingBack,
    /// Rollback finished; the last known-good group still serves (terminal).
    RolledBack { reason: String },
    /// Failed before any traffic was touched (terminal).
    Failed { reason: String },
}

impl PromotionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PromotionPhase::Promoted
                | PromotionPhase::RolledBack { .. }
                | PromotionPhase::Failed { .. }
        )
    }
}

/// One promotion attempt, from image detection to a terminal phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionAttempt {
    pub id: AttemptId,
    pub service: ServiceId,
    pub change: ImageChange,
    pub phase: PromotionPhase,
    /// The image serving before this attempt; known once live state has
    /// been read.
    pub old_image: Option<ImageRef>,
    /// Unix timestamp (seconds) when the attempt was created.
    pub created_at: u64,
}

impl PromotionAttempt {
    pub fn new(id: &str, service: &str, change: ImageChange, created_at: u64) -> Self {
        Self {
            id: id.to_string(),
            service: service.to_string(),
            change,
            phase: PromotionPhase::Pending,
            old_image: None,
            created_at,
        }
    }

    pub fn new_image(&self) -> ImageRef {
        self.change.image_ref()
    }
}
