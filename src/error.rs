//! Error types shared across the client

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, RecognitionError>;

/// Errors surfaced by the recognition client
///
/// Model-level failures (the backend ran but reported an `error` field) are not
/// represented here; they are a normal outcome carried by
/// [`NormalizedResult::Failed`](crate::workflow::NormalizedResult::Failed).
#[derive(Error, Debug)]
pub enum RecognitionError {
    /// The backend could not be reached or rejected the transport. Message is verbatim.
    #[error("{0}")]
    Transport(String),

    /// Operation invoked out of order, e.g. process before upload
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Another operation holds the slot this call needs
    #[error("Operation already in flight: {0}")]
    Busy(String),

    /// Bulk operation where some items failed
    #[error("{failed} of {total} operations failed")]
    PartialBatch { failed: usize, total: usize },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RecognitionError {
    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(message) => message.clone(),
            other => other.to_string(),
        }
    }
}
