//! Rate limit manager implementation.

use config::RateLimitConfig;

use crate::error::RateLimitError;
use crate::storage::{FixedWindowStorage, QuotaStatus, RateLimitStorage};

/// Manager enforcing the configured per-identity quota.
#[derive(Debug)]
pub struct RateLimitManager {
    config: RateLimitConfig,
    storage: FixedWindowStorage,
}

impl RateLimitManager {
    /// Create a new rate limit manager. Fails when rate limiting is enabled
    /// with a zero-length window.
    pub fn new(config: RateLimitConfig) -> Result<Self, RateLimitError> {
        if config.enabled && config.interval.is_zero() {
            return Err(RateLimitError::InvalidInterval);
        }

        Ok(Self {
            config,
            storage: FixedWindowStorage::new(),
        })
    }

    /// Check if rate limiting is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Check and consume one admission for the given identity.
    ///
    /// On admission returns the identity's quota standing, or `None` when
    /// the limiter is disabled. Exhaustion is an error carrying the
    /// retry-after hint and the standing for the client.
    pub async fn check(&self, identity: &str) -> Result<Option<QuotaStatus>, RateLimitError> {
        if !self.config.enabled {
            return Ok(None);
        }

        let result = self
            .storage
            .check_and_consume(identity, self.config.limit, self.config.interval)
            .await?;

        if !result.allowed {
            return Err(RateLimitError::LimitExceeded {
                retry_after: result.retry_after,
                quota: result.quota,
            });
        }

        Ok(Some(result.quota))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn quota(limit: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            limit,
            interval: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn enforces_configured_limit() {
        let manager = RateLimitManager::new(quota(2)).unwrap();

        assert!(manager.check("key:abcd1234").await.is_ok());
        assert!(manager.check("key:abcd1234").await.is_ok());

        let err = manager.check("key:abcd1234").await.unwrap_err();
        assert!(matches!(err, RateLimitError::LimitExceeded { .. }));
        assert!(err.retry_after().is_some());
    }

    #[tokio::test]
    async fn separate_identities_do_not_share_quota() {
        let manager = RateLimitManager::new(quota(1)).unwrap();

        assert!(manager.check("key:aaaa0000").await.is_ok());
        assert!(manager.check("key:aaaa0000").await.is_err());
        assert!(manager.check("ip:10.0.0.1").await.is_ok());
    }

    #[tokio::test]
    async fn reports_quota_standing_on_both_outcomes() {
        let manager = RateLimitManager::new(quota(2)).unwrap();

        let standing = manager.check("key:abcd1234").await.unwrap().unwrap();
        assert_eq!((standing.limit, standing.remaining), (2, 1));

        let standing = manager.check("key:abcd1234").await.unwrap().unwrap();
        assert_eq!(standing.remaining, 0);

        let err = manager.check("key:abcd1234").await.unwrap_err();
        assert!(matches!(
            err,
            RateLimitError::LimitExceeded {
                quota: QuotaStatus {
                    limit: 2,
                    remaining: 0,
                    ..
                },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn disabled_manager_admits_everything() {
        let config = RateLimitConfig {
            enabled: false,
            limit: 0,
            interval: Duration::from_secs(60),
        };
        let manager = RateLimitManager::new(config).unwrap();

        for _ in 0..10 {
            assert!(manager.check("anyone").await.is_ok());
        }
    }

    #[test]
    fn zero_interval_is_rejected_at_construction() {
        let config = RateLimitConfig {
            enabled: true,
            limit: 100,
            interval: Duration::ZERO,
        };

        let err = RateLimitManager::new(config).unwrap_err();
        assert!(matches!(err, RateLimitError::InvalidInterval));
    }
}
