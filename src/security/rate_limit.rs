//! Fixed-window rate limiting keyed by caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::observability::metrics;

/// Counter for one key's current window.
#[derive(Debug, Clone, Copy)]
pub struct RateWindow {
    pub count: u32,
    pub window_start: Instant,
    window: Duration,
}

impl RateWindow {
    fn start(now: Instant, window: Duration) -> Self {
        Self {
            count: 1,
            window_start: now,
            window,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= self.window
    }

    fn remaining(&self, now: Instant) -> Duration {
        self.window
            .saturating_sub(now.saturating_duration_since(self.window_start))
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Admitted {
        /// Requests left in the current window.
        remaining: u32,
    },
    Limited {
        /// Time until the current window ends.
        retry_after: Duration,
    },
}

impl RateDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, RateDecision::Admitted { .. })
    }
}

/// Whole seconds for a `Retry-After` header; never zero.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let millis = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX);
    millis.div_ceil(1000).max(1)
}

/// Shared window table.
///
/// Increments for one key happen under that key's shard write lock, so two
/// racing requests can never both take the last slot of a window.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, RateWindow>,
    max_keys: usize,
}

impl RateLimiter {
    pub fn new(max_keys: usize) -> Self {
        Self {
            windows: DashMap::new(),
            max_keys: max_keys.max(1),
        }
    }

    /// Admit or reject one request for `key`.
    pub fn admit(&self, key: &str, limit: u32, window_ms: u64) -> bool {
        self.check(key, limit, Duration::from_millis(window_ms))
            .is_admitted()
    }

    pub fn check(&self, key: &str, limit: u32, window: Duration) -> RateDecision {
        self.check_at(key, limit, window, Instant::now())
    }

    pub fn check_at(&self, key: &str, limit: u32, window: Duration, now: Instant) -> RateDecision {
        // Must run before `entry` takes a shard lock.
        if !self.windows.contains_key(key) && self.windows.len() >= self.max_keys {
            self.make_room(now);
        }

        match self.windows.entry(key.to_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(RateWindow::start(now, window));
                RateDecision::Admitted {
                    remaining: limit.saturating_sub(1),
                }
            }
            Entry::Occupied(mut slot) => {
                let current = slot.get_mut();
                if current.is_expired(now) {
                    *current = RateWindow::start(now, window);
                    return RateDecision::Admitted {
                        remaining: limit.saturating_sub(1),
                    };
                }

                current.count = current.count.saturating_add(1);
                if current.count <= limit {
                    RateDecision::Admitted {
                        remaining: limit - current.count,
                    }
                } else {
                    RateDecision::Limited {
                        retry_after: current.remaining(now),
                    }
                }
            }
        }
    }

    /// Drop every expired window. Returns how many were removed.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| !w.is_expired(now));
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            metrics::record_rate_limit_evictions("expired", removed);
        }
        removed
    }

    fn make_room(&self, now: Instant) {
        self.sweep_expired(now);
        if self.windows.len() < self.max_keys {
            return;
        }

        let oldest = self
            .windows
            .iter()
            .min_by_key(|entry| entry.value().window_start)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.windows.remove(&key);
            metrics::record_rate_limit_evictions("capacity", 1);
            tracing::debug!(key = %key, "Rate limit table full, evicted oldest window");
        }
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Periodically sweep expired windows until shutdown.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(interval_secs = interval.as_secs(), "Rate limit sweeper starting");
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.sweep_expired(Instant::now());
                        tracing::trace!(removed, tracked = self.len(), "Rate limit sweep");
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Rate limit sweeper received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Barrier;

    const SECOND: Duration = Duration::from_millis(1000);

    #[test]
    fn test_fixed_window_sequence() {
        let limiter = RateLimiter::new(100);
        let start = Instant::now();
        let results: Vec<bool> = (0..4)
            .map(|i| {
                limiter
                    .check_at("ip:10.0.0.1", 3, SECOND, start + Duration::from_millis(i * 10))
                    .is_admitted()
            })
            .collect();
        assert_eq!(results, vec![true, true, true, false]);

        let later = start + Duration::from_millis(1001);
        assert!(limiter.check_at("ip:10.0.0.1", 3, SECOND, later).is_admitted());
    }

    #[test]
    fn test_admit_wrapper() {
        let limiter = RateLimiter::new(100);
        assert!(limiter.admit("k", 1, 60_000));
        assert!(!limiter.admit("k", 1, 60_000));
        assert!(limiter.admit("other", 1, 60_000));
    }

    #[test]
    fn test_retry_after_reflects_remaining_window() {
        let limiter = RateLimiter::new(100);
        let start = Instant::now();
        limiter.check_at("k", 1, SECOND, start);
        let decision = limiter.check_at("k", 1, SECOND, start + Duration::from_millis(400));
        assert_eq!(
            decision,
            RateDecision::Limited {
                retry_after: Duration::from_millis(600)
            }
        );
        assert_eq!(retry_after_secs(Duration::from_millis(600)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }

    #[test]
    fn test_remaining_counts_down() {
        let limiter = RateLimiter::new(100);
        let now = Instant::now();
        assert_eq!(
            limiter.check_at("k", 2, SECOND, now),
            RateDecision::Admitted { remaining: 1 }
        );
        assert_eq!(
            limiter.check_at("k", 2, SECOND, now),
            RateDecision::Admitted { remaining: 0 }
        );
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let limiter = RateLimiter::new(100);
        let start = Instant::now();
        limiter.check_at("old", 5, SECOND, start);
        limiter.check_at("new", 5, SECOND, start + Duration::from_millis(900));

        let removed = limiter.sweep_expired(start + Duration::from_millis(1200));
        assert_eq!(removed, 1);
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let limiter = RateLimiter::new(2);
        let start = Instant::now();
        limiter.check_at("a", 5, SECOND, start);
        limiter.check_at("b", 5, SECOND, start + Duration::from_millis(10));
        limiter.check_at("c", 5, SECOND, start + Duration::from_millis(20));

        assert_eq!(limiter.len(), 2);
        // "a" was evicted, so it starts a fresh window.
        assert_eq!(
            limiter.check_at("b", 5, SECOND, start + Duration::from_millis(30)),
            RateDecision::Admitted { remaining: 3 }
        );
        assert!(!limiter.windows.contains_key("a"));
    }

    #[test]
    fn test_concurrent_last_slot_admitted_once() {
        let limiter = RateLimiter::new(100);
        let admitted = AtomicU32::new(0);
        let threads = 16;
        let barrier = Barrier::new(threads);

        std::thread::scope(|s| {
            for _ in 0..threads {
                s.spawn(|| {
                    barrier.wait();
                    if limiter.admit("sub:racer", 1, 60_000) {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let limiter = Arc::new(RateLimiter::new(10));
        let (tx, rx) = broadcast::channel(1);
        let handle = limiter.clone().spawn_sweeper(Duration::from_millis(10), rx);
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
