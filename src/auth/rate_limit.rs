//! Per-client rate limiting for login attempts.
//!
//! Each key keeps a log of the instants at which it was admitted. A request is
//! admitted only if fewer than `max_requests` admissions fall inside the trailing
//! window, so no 60-second span ever contains more than `max_requests` admitted
//! requests for one key. Counters live in this process only; several processes
//! behind a balancer each enforce the limit independently.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::{collections::VecDeque, sync::Arc};

use crate::clock::Clock;

/// Default number of login attempts per window.
pub const DEFAULT_MAX_REQUESTS: usize = 5;

/// Default window length (one minute).
pub const DEFAULT_WINDOW_SECS: i64 = 60;

pub struct RateLimiter {
    hits: DashMap<String, VecDeque<DateTime<Utc>>>,
    max_requests: usize,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            hits: DashMap::new(),
            max_requests,
            window,
            clock,
        }
    }

    /// Records an attempt for `key` and reports whether it may proceed.
    ///
    /// The check and the increment happen under the key's shard lock, so two
    /// concurrent attempts cannot both see the last free slot.
    pub fn allow(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut entry = self.hits.entry(key.to_string()).or_default();
        let hits = entry.value_mut();
        prune(hits, now, self.window);

        if hits.len() >= self.max_requests {
            log::warn!("Rate limit exceeded for {}", key);
            return false;
        }
        hits.push_back(now);
        true
    }

    /// How long until `key` may be admitted again, if it is currently limited.
    pub fn retry_after(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        let hits = self.hits.get(key)?;
        let live: Vec<_> = hits.iter().filter(|at| now - **at < self.window).collect();
        if live.len() < self.max_requests {
            return None;
        }
        live.first().map(|oldest| self.window - (now - **oldest))
    }

    /// Drops keys with no admissions inside the window.
    pub fn purge_idle(&self) {
        let now = self.clock.now();
        let window = self.window;
        self.hits.retain(|_, hits| {
            prune(hits, now, window);
            !hits.is_empty()
        });
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.hits.len()
    }
}

fn prune(hits: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) {
    while hits.front().is_some_and(|at| now - *at >= window) {
        hits.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(clock: Arc<ManualClock>) -> RateLimiter {
        RateLimiter::new(
            DEFAULT_MAX_REQUESTS,
            Duration::seconds(DEFAULT_WINDOW_SECS),
            clock,
        )
    }

    #[test]
    fn test_sixth_attempt_in_window_is_rejected() {
        let clock = Arc::new(ManualClock::default());
        let limiter = limiter(clock.clone());

        for attempt in 1..=5 {
            assert!(limiter.allow("10.0.0.1"), "attempt {}", attempt);
            clock.advance(Duration::seconds(5));
        }
        assert!(!limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter(Arc::new(ManualClock::default()));
        for _ in 0..5 {
            assert!(limiter.allow("10.0.0.1"));
        }
        assert!(!limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.2"));
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[test]
    fn test_window_slides() {
        let clock = Arc::new(ManualClock::default());
        let limiter = limiter(clock.clone());

        // One attempt at t=0, four at t=30s.
        assert!(limiter.allow("k"));
        clock.advance(Duration::seconds(30));
        for _ in 0..4 {
            assert!(limiter.allow("k"));
        }
        assert!(!limiter.allow("k"));
        assert_eq!(limiter.retry_after("k"), Some(Duration::seconds(30)));

        // At t=60s the first attempt leaves the window, freeing exactly one slot.
        clock.advance(Duration::seconds(30));
        assert_eq!(limiter.retry_after("k"), None);
        assert!(limiter.allow("k"));
        assert!(!limiter.allow("k"));

        // At t=90s the four attempts from t=30s are gone.
        clock.advance(Duration::seconds(30));
        for _ in 0..4 {
            assert!(limiter.allow("k"));
        }
        assert!(!limiter.allow("k"));
    }

    #[test]
    fn test_rejections_do_not_extend_the_window() {
        let clock = Arc::new(ManualClock::default());
        let limiter = limiter(clock.clone());
        for _ in 0..5 {
            assert!(limiter.allow("k"));
        }
        for _ in 0..10 {
            clock.advance(Duration::seconds(5));
            assert!(!limiter.allow("k"));
        }
        clock.advance(Duration::seconds(10));
        assert!(limiter.allow("k"));
    }

    #[test]
    fn test_purge_idle_drops_expired_keys() {
        let clock = Arc::new(ManualClock::default());
        let limiter = limiter(clock.clone());
        limiter.allow("old");
        clock.advance(Duration::seconds(45));
        limiter.allow("recent");

        clock.advance(Duration::seconds(20));
        limiter.purge_idle();
        assert_eq!(limiter.tracked_keys(), 1);
        assert!(limiter.retry_after("recent").is_none());
    }

    #[test]
    fn test_concurrent_attempts_admit_at_most_the_limit() {
        let limiter = Arc::new(limiter(Arc::new(ManualClock::default())));
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || limiter.allow("shared"))
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|admitted| *admitted)
            .count();
        assert_eq!(admitted, DEFAULT_MAX_REQUESTS);
    }
}
