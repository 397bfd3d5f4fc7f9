//! Error types for the instance sync client.

use thiserror::Error;

/// Result type alias using the sync error type.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Main error type for the sync client.
///
/// The taxonomy is deliberately small: a call either failed to complete at
/// the network level, or completed with a body we could not interpret.
/// Non-success HTTP statuses on bulk updates are *not* errors; they are
/// reported through [`crate::publisher::BatchResult`].
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network/connection failure on any call. Never retried internally.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body was missing an expected field or was not the expected
    /// JSON shape.
    #[error("protocol error: {context}")]
    Protocol {
        /// What we were trying to read when the body let us down.
        context: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General error from anyhow.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    /// Shorthand for a protocol error with context.
    pub fn protocol(context: impl Into<String>) -> Self {
        SyncError::Protocol {
            context: context.into(),
        }
    }
}
