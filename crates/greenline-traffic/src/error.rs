//! Traffic layer error types.

use thiserror::Error;

/// Result type alias for traffic layer operations.
pub type TrafficResult<T> = Result<T, TrafficError>;

/// Errors that can occur when mutating routing state.
#[derive(Debug, Error)]
pub enum TrafficError {
    /// The swap target has no registered backends; shifting the
    /// listener there would blackhole all traffic.
    #[error("standby target group {0} has no registered targets")]
    EmptyStandby(String),

    #[error("target {target} is not registered in group {group}")]
    UnknownTarget { group: String, target: String },
}
