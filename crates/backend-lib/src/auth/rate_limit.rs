// ============================
// crates/backend-lib/src/auth/rate_limit.rs
// ============================
//! Sliding-window admission control.

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Allows at most `limit` admissions per key within the trailing `window`.
///
/// Each key maps to the timestamps of its admissions inside the window;
/// denied calls are not recorded, so a client that keeps hammering does not
/// extend its own lockout.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    hits: DashMap<String, Vec<Instant>>,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: DashMap::new(),
        }
    }

    /// Admit or reject one event for `key`.
    pub fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let window_start = now - self.window;

        let mut entry = self.hits.entry(key.to_string()).or_default();
        entry.retain(|ts| *ts > window_start);
        if entry.len() >= self.limit {
            return false;
        }
        entry.push(now);
        true
    }

    /// Drop all state for `key`. Called when a connection-scoped key goes
    /// away so the map does not grow with connection churn.
    pub fn forget(&self, key: &str) {
        self.hits.remove(key);
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.hits.len()
    }
}
