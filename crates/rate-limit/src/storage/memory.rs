//! In-memory fixed-window rate limit storage.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::{QuotaStatus, RateLimitResult, RateLimitStorage, StorageError};

/// How often the idle sweep runs, counted in storage checks.
const SWEEP_EVERY: u64 = 4096;

/// Windows that expired this many intervals ago are reclaimed by the sweep.
const RETENTION_INTERVALS: u32 = 10;

/// Per-identity window state. `started_at` only moves forward, and `count`
/// never grows past the configured limit.
#[derive(Debug)]
struct Window {
    started_at: Instant,
    count: u32,
}

/// In-memory fixed-window storage.
///
/// Windows are keyed by client identity in a concurrent map. The map's
/// entry API holds a per-shard write lock for the duration of the
/// read-compare-increment sequence, so concurrent checks for the same
/// identity serialize while different identities only contend when they
/// hash to the same shard.
#[derive(Debug)]
pub struct FixedWindowStorage {
    windows: DashMap<String, Window>,
    checks: AtomicU64,
}

impl FixedWindowStorage {
    /// Create a new in-memory storage instance.
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
            checks: AtomicU64::new(0),
        }
    }

    /// Check the window for `key` at an explicit timestamp, consuming one
    /// admission when allowed. Timestamps must come from a monotonic clock;
    /// a timestamp earlier than the window start reads as zero elapsed time
    /// and cannot re-open an exhausted window.
    pub fn check_at(&self, key: &str, limit: u32, interval: Duration, now: Instant) -> RateLimitResult {
        if limit == 0 {
            log::debug!("Request blocked for key '{key}' - limit is zero");
            return RateLimitResult {
                allowed: false,
                retry_after: None,
                quota: QuotaStatus {
                    limit: 0,
                    remaining: 0,
                    reset_after: interval,
                },
            };
        }

        self.maybe_sweep(interval, now);

        let mut entry = self.windows.entry(key.to_owned()).or_insert_with(|| Window {
            started_at: now,
            count: 0,
        });
        let window = entry.value_mut();

        let elapsed = now.saturating_duration_since(window.started_at);

        if elapsed >= interval {
            window.started_at = now;
            window.count = 1;

            log::debug!("Request allowed for key '{key}' - new window started");

            return RateLimitResult {
                allowed: true,
                retry_after: None,
                quota: QuotaStatus {
                    limit,
                    remaining: limit - 1,
                    reset_after: interval,
                },
            };
        }

        if window.count < limit {
            window.count = window.count.saturating_add(1);

            log::debug!("Request allowed for key '{key}' - {} of {limit} used", window.count);

            RateLimitResult {
                allowed: true,
                retry_after: None,
                quota: QuotaStatus {
                    limit,
                    remaining: limit - window.count,
                    reset_after: interval - elapsed,
                },
            }
        } else {
            let retry_after = interval - elapsed;

            log::debug!("Request blocked for key '{key}' - window exhausted, retry after {retry_after:?}");

            RateLimitResult {
                allowed: false,
                retry_after: Some(retry_after),
                quota: QuotaStatus {
                    limit,
                    remaining: 0,
                    reset_after: retry_after,
                },
            }
        }
    }

    /// Drops windows that expired more than `RETENTION_INTERVALS` intervals
    /// ago. Retention bounds memory for identities that stopped sending
    /// traffic; it has no effect on admission decisions.
    fn maybe_sweep(&self, interval: Duration, now: Instant) {
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY != 0 {
            return;
        }

        let retention = interval.saturating_mul(RETENTION_INTERVALS);

        self.windows
            .retain(|_, window| now.saturating_duration_since(window.started_at) < retention);
    }
}

impl Default for FixedWindowStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitStorage for FixedWindowStorage {
    async fn check_and_consume(
        &self,
        key: &str,
        limit: u32,
        interval: Duration,
    ) -> Result<RateLimitResult, StorageError> {
        Ok(self.check_at(key, limit, interval, Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn admits_up_to_limit_then_rejects() {
        let storage = FixedWindowStorage::new();
        let now = Instant::now();

        assert!(storage.check_at("k1", 2, MINUTE, now).allowed);
        assert!(storage.check_at("k1", 2, MINUTE, now + Duration::from_secs(1)).allowed);

        let rejected = storage.check_at("k1", 2, MINUTE, now + Duration::from_secs(2));
        assert!(!rejected.allowed);
        assert_eq!(rejected.retry_after, Some(Duration::from_secs(58)));
    }

    #[test]
    fn rejection_does_not_reset_the_window() {
        let storage = FixedWindowStorage::new();
        let now = Instant::now();

        assert!(storage.check_at("k1", 1, MINUTE, now).allowed);

        // Repeated rejections late in the window keep reporting the time
        // until the original window expires.
        for seconds in [10, 30, 59] {
            let rejected = storage.check_at("k1", 1, MINUTE, now + Duration::from_secs(seconds));
            assert!(!rejected.allowed);
            assert_eq!(rejected.retry_after, Some(Duration::from_secs(60 - seconds)));
        }
    }

    #[test]
    fn window_rollover_admits_again() {
        let storage = FixedWindowStorage::new();
        let now = Instant::now();

        assert!(storage.check_at("k1", 2, MINUTE, now).allowed);
        assert!(storage.check_at("k1", 2, MINUTE, now).allowed);
        assert!(!storage.check_at("k1", 2, MINUTE, now + Duration::from_secs(59)).allowed);

        // One interval past the window start, even an exhausted window
        // rolls over into a fresh one.
        let after = storage.check_at("k1", 2, MINUTE, now + Duration::from_secs(61));
        assert!(after.allowed);

        // The fresh window already has one admission consumed.
        assert!(storage.check_at("k1", 2, MINUTE, now + Duration::from_secs(62)).allowed);
        assert!(!storage.check_at("k1", 2, MINUTE, now + Duration::from_secs(63)).allowed);
    }

    #[test]
    fn quota_standing_counts_down_and_reports_reset() {
        let storage = FixedWindowStorage::new();
        let now = Instant::now();

        let first = storage.check_at("k1", 3, MINUTE, now);
        assert_eq!(
            first.quota,
            QuotaStatus {
                limit: 3,
                remaining: 2,
                reset_after: MINUTE,
            }
        );

        let second = storage.check_at("k1", 3, MINUTE, now + Duration::from_secs(10));
        assert_eq!(
            second.quota,
            QuotaStatus {
                limit: 3,
                remaining: 1,
                reset_after: Duration::from_secs(50),
            }
        );

        let third = storage.check_at("k1", 3, MINUTE, now + Duration::from_secs(20));
        assert_eq!(third.quota.remaining, 0);

        let rejected = storage.check_at("k1", 3, MINUTE, now + Duration::from_secs(30));
        assert!(!rejected.allowed);
        assert_eq!(
            rejected.quota,
            QuotaStatus {
                limit: 3,
                remaining: 0,
                reset_after: Duration::from_secs(30),
            }
        );
    }

    #[test]
    fn identities_are_isolated() {
        let storage = FixedWindowStorage::new();
        let now = Instant::now();

        assert!(storage.check_at("a", 1, MINUTE, now).allowed);
        assert!(!storage.check_at("a", 1, MINUTE, now).allowed);

        assert!(storage.check_at("b", 1, MINUTE, now).allowed);
    }

    #[test]
    fn zero_limit_rejects_everything() {
        let storage = FixedWindowStorage::new();
        let now = Instant::now();

        let rejected = storage.check_at("k1", 0, MINUTE, now);
        assert!(!rejected.allowed);
        assert_eq!(rejected.retry_after, None);

        // Waiting out a full window changes nothing.
        assert!(!storage.check_at("k1", 0, MINUTE, now + MINUTE * 2).allowed);
    }

    #[test]
    fn backwards_timestamp_cannot_reopen_window() {
        let storage = FixedWindowStorage::new();
        let now = Instant::now();
        let later = now + Duration::from_secs(30);

        assert!(storage.check_at("k1", 1, MINUTE, later).allowed);

        // An earlier timestamp reads as zero elapsed time inside the
        // current window, so the exhausted window holds.
        assert!(!storage.check_at("k1", 1, MINUTE, now).allowed);
    }

    #[test]
    fn concurrent_burst_admits_exactly_limit() {
        let storage = Arc::new(FixedWindowStorage::new());
        let barrier = Arc::new(Barrier::new(100));
        let now = Instant::now();

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let storage = Arc::clone(&storage);
                let barrier = Arc::clone(&barrier);

                std::thread::spawn(move || {
                    barrier.wait();
                    storage.check_at("k1", 10, MINUTE, now).allowed
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .filter_map(|handle| handle.join().ok())
            .filter(|&admitted| admitted)
            .count();

        assert_eq!(admitted, 10);
    }

    #[test]
    fn sweep_reclaims_long_idle_windows() {
        let storage = FixedWindowStorage::new();
        let now = Instant::now();

        assert!(storage.check_at("idle", 10, MINUTE, now).allowed);
        assert!(storage.windows.contains_key("idle"));

        // Far enough in the future that the idle window is past retention;
        // drive enough checks through another key to trigger a sweep.
        let distant = now + MINUTE.saturating_mul(RETENTION_INTERVALS + 1);

        for _ in 0..=SWEEP_EVERY {
            storage.check_at("busy", u32::MAX, MINUTE, distant);
        }

        assert!(!storage.windows.contains_key("idle"));
        assert!(storage.windows.contains_key("busy"));
    }
}
