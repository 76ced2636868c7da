//! Descriptor generator error types.

use thiserror::Error;

/// Result type alias for descriptor generation.
pub type DescriptorResult<T> = Result<T, DescriptorError>;

/// Errors that can occur while deriving deployment documents.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The referenced service or task spec does not exist. Not retried;
    /// surfaced to the operator.
    #[error("not found: {0}")]
    NotFound(String),

    /// Live state is inconsistent (e.g. the service is mid-promotion).
    /// Retried with backoff up to a bounded attempt count.
    #[error("invalid live state: {0}")]
    InvalidState(String),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("state store error: {0}")]
    State(#[from] greenline_state::StateError),
}
