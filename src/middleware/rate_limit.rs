//! Per-principal rate limiting over a rolling minute.
//!
//! State is in-process only: a counter per principal per minute window,
//! checked immediately after authentication so an over-quota caller never
//! reaches an upstream.

use dashmap::DashMap;

use crate::config::RateLimitConfig;

pub struct RateLimiter {
    enabled: bool,
    requests_per_minute: u32,
    counters: DashMap<i64, (u64, u32)>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            requests_per_minute: config.requests_per_minute,
            counters: DashMap::new(),
        }
    }

    /// Record one request for the principal. Returns false when the
    /// principal is over quota for the current minute.
    pub fn check(&self, principal_id: i64) -> bool {
        if !self.enabled {
            return true;
        }
        let window = current_minute();

        let mut entry = self.counters.entry(principal_id).or_insert((window, 0));
        let (entry_window, count) = *entry;
        if entry_window != window {
            *entry = (window, 1);
            return true;
        }
        if count >= self.requests_per_minute {
            return false;
        }
        *entry = (window, count + 1);
        true
    }

    /// Drop counters from past windows. Called opportunistically; staleness
    /// is harmless since `check` resets old windows anyway.
    pub fn prune(&self) {
        let window = current_minute();
        self.counters.retain(|_, (w, _)| *w == window);
    }
}

fn current_minute() -> u64 {
    (chrono::Utc::now().timestamp() / 60) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(enabled: bool, rpm: u32) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            enabled,
            requests_per_minute: rpm,
        })
    }

    #[test]
    fn disabled_limiter_always_allows() {
        let limiter = limiter(false, 1);
        for _ in 0..100 {
            assert!(limiter.check(1));
        }
    }

    #[test]
    fn quota_is_enforced_per_principal() {
        let limiter = limiter(true, 3);
        for _ in 0..3 {
            assert!(limiter.check(1));
        }
        assert!(!limiter.check(1));
        // A different principal has its own budget.
        assert!(limiter.check(2));
    }

    #[test]
    fn prune_keeps_current_window() {
        let limiter = limiter(true, 10);
        assert!(limiter.check(1));
        limiter.prune();
        assert!(!limiter.counters.is_empty());
    }
}
