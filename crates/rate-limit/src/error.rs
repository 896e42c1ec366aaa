//! Error types for rate limiting.

use std::time::Duration;

use crate::storage::{QuotaStatus, StorageError};

/// Errors that can occur during rate limiting.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// The configured window interval is zero. This is invalid
    /// configuration and must be rejected at startup.
    #[error("rate limit interval must be greater than zero")]
    InvalidInterval,

    /// The identity exhausted its quota for the current window.
    #[error("Rate limit exceeded")]
    LimitExceeded {
        /// Time to wait until the window resets, when known.
        retry_after: Option<Duration>,
        /// The exhausted quota standing, for advertising to the client.
        quota: QuotaStatus,
    },

    /// Storage backend error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl RateLimitError {
    /// Get the retry-after duration if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::LimitExceeded { retry_after, .. } => *retry_after,
            Self::InvalidInterval | Self::Storage(_) => None,
        }
    }
}
