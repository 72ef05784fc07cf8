//! Per-source call budget over a one-minute window.
//!
//! [`RateLimiter::allow`] never blocks: it answers whether a call may go out
//! now and counts it if so. Windows reset lazily when a call arrives more than
//! a minute after the window opened. Sources without a configured limit are
//! unlimited.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Length of one rate-limit window.
pub const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: Instant,
    count: u32,
}

/// Sliding per-source call counter.
#[derive(Debug)]
pub struct RateLimiter {
    limits: HashMap<String, u32>,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    /// Create a limiter from `source id → calls per minute`.
    ///
    /// A limit of 0 is treated as "no limit".
    pub fn new(limits: HashMap<String, u32>) -> Self {
        let limits = limits.into_iter().filter(|(_, limit)| *limit > 0).collect();
        Self {
            limits,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// The configured per-minute limit for `source_id`, if any.
    pub fn limit_for(&self, source_id: &str) -> Option<u32> {
        self.limits.get(source_id).copied()
    }

    /// Check and count a call to `source_id` at the current time.
    pub fn allow(&self, source_id: &str) -> bool {
        self.allow_at(source_id, Instant::now())
    }

    /// Check and count a call to `source_id` at `now`.
    pub fn allow_at(&self, source_id: &str, now: Instant) -> bool {
        let Some(limit) = self.limit_for(source_id) else {
            return true;
        };

        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let window = windows.entry(source_id.to_owned()).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if now.saturating_duration_since(window.started_at) > WINDOW {
            window.started_at = now;
            window.count = 0;
        }

        if window.count < limit {
            window.count += 1;
            true
        } else {
            tracing::debug!(source = source_id, limit, "rate limit reached");
            false
        }
    }

    /// Calls counted in the current window for `source_id`.
    pub fn calls_in_window(&self, source_id: &str) -> u32 {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source_id)
            .map_or(0, |w| w.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(source: &str, limit: u32) -> RateLimiter {
        RateLimiter::new(HashMap::from([(source.to_owned(), limit)]))
    }

    #[test]
    fn allows_up_to_limit_then_denies() {
        let rl = limiter("pubmed", 3);
        let t0 = Instant::now();
        assert!(rl.allow_at("pubmed", t0));
        assert!(rl.allow_at("pubmed", t0 + Duration::from_secs(1)));
        assert!(rl.allow_at("pubmed", t0 + Duration::from_secs(2)));
        assert!(!rl.allow_at("pubmed", t0 + Duration::from_secs(3)));
        assert_eq!(rl.calls_in_window("pubmed"), 3);
    }

    #[test]
    fn window_rollover_allows_again() {
        let rl = limiter("pubmed", 2);
        let t0 = Instant::now();
        assert!(rl.allow_at("pubmed", t0));
        assert!(rl.allow_at("pubmed", t0));
        assert!(!rl.allow_at("pubmed", t0 + Duration::from_secs(30)));
        assert!(rl.allow_at("pubmed", t0 + Duration::from_secs(61)));
        assert_eq!(rl.calls_in_window("pubmed"), 1);
    }

    #[test]
    fn exactly_sixty_seconds_is_same_window() {
        let rl = limiter("tga", 1);
        let t0 = Instant::now();
        assert!(rl.allow_at("tga", t0));
        assert!(!rl.allow_at("tga", t0 + WINDOW));
    }

    #[test]
    fn unconfigured_source_is_unlimited() {
        let rl = limiter("pubmed", 1);
        let t0 = Instant::now();
        for _ in 0..100 {
            assert!(rl.allow_at("nejm", t0));
        }
        assert_eq!(rl.calls_in_window("nejm"), 0);
    }

    #[test]
    fn zero_limit_means_unlimited() {
        let rl = limiter("chembl", 0);
        assert!(rl.limit_for("chembl").is_none());
        assert!(rl.allow("chembl"));
    }

    #[test]
    fn sources_are_independent() {
        let rl = RateLimiter::new(HashMap::from([
            ("pubmed".to_owned(), 1),
            ("fda-drugs".to_owned(), 1),
        ]));
        let t0 = Instant::now();
        assert!(rl.allow_at("pubmed", t0));
        assert!(!rl.allow_at("pubmed", t0));
        assert!(rl.allow_at("fda-drugs", t0));
    }
}
