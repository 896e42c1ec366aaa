//! Storage backends for rate limiting.

use std::time::Duration;

pub mod memory;

pub use memory::FixedWindowStorage;

/// Result type for rate limit checks.
pub struct RateLimitResult {
    /// Whether the request is allowed.
    pub allowed: bool,
    /// Time to wait until the window resets if not allowed. `None` when the
    /// limit is zero and no amount of waiting will help.
    pub retry_after: Option<Duration>,
    /// The identity's quota standing after this check.
    pub quota: QuotaStatus,
}

/// A client's quota standing after a check, surfaced to callers so they
/// can advertise it before the quota is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    /// Maximum admissions per window.
    pub limit: u32,
    /// Admissions left in the current window.
    pub remaining: u32,
    /// Time until the current window resets.
    pub reset_after: Duration,
}

/// Trait for rate limit storage backends.
#[allow(async_fn_in_trait)]
pub trait RateLimitStorage: Send + Sync {
    /// Check the window for the given key and consume one admission if the
    /// request is allowed.
    async fn check_and_consume(
        &self,
        key: &str,
        limit: u32,
        interval: Duration,
    ) -> Result<RateLimitResult, StorageError>;
}

/// Errors that can occur in storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Internal storage error.
    #[error("Storage error: {0}")]
    Internal(String),
}
