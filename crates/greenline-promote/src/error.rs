//! Promotion error taxonomy.

use std::time::Duration;

use thiserror::Error;

use greenline_descriptor::DescriptorError;
use greenline_health::VerifyError;
use greenline_traffic::TrafficError;

/// Result type alias for promotion operations.
pub type PromoteResult<T> = Result<T, PromoteError>;

/// Errors that can end a promotion attempt.
#[derive(Debug, Error)]
pub enum PromoteError {
    /// Referenced service/task/secret does not exist. Not retried;
    /// surfaced to the operator.
    #[error("not found: {0}")]
    NotFound(String),

    /// Live state inconsistent (e.g. mid-deployment). Retried after
    /// backoff up to a bounded attempt count, then surfaced.
    #[error("invalid live state: {0}")]
    InvalidState(String),

    /// The verification window elapsed. Triggers automatic rollback;
    /// recorded as a failed attempt, not fatal to the daemon.
    #[error("health check timeout: group {group} not healthy within {timeout:?}")]
    HealthCheckTimeout { group: String, timeout: Duration },

    /// The traffic layer rejected the routing change. Fatal to the
    /// attempt; triggers rollback.
    #[error("traffic shift rejected: {0}")]
    TrafficShift(String),

    #[error("task launch failed: {0}")]
    Launch(String),

    #[error("state store error: {0}")]
    State(#[from] greenline_state::StateError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DescriptorError> for PromoteError {
    fn from(err: DescriptorError) -> Self {
        match err {
            DescriptorError::NotFound(s) => PromoteError::NotFound(s),
            DescriptorError::InvalidState(s) => PromoteError::InvalidState(s),
            DescriptorError::Serialize(e) => PromoteError::Internal(e.to_string()),
            DescriptorError::State(e) => PromoteError::State(e),
        }
    }
}

impl From<TrafficError> for PromoteError {
    fn from(err: TrafficError) -> Self {
        PromoteError::TrafficShift(err.to_string())
    }
}

impl From<VerifyError> for PromoteError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Timeout { group, timeout } => {
                PromoteError::HealthCheckTimeout { group, timeout }
            }
        }
    }
}
