// ============================
// crates/backend-lib/src/metrics.rs
// ============================
//! Process-local counters exposed by GET /metrics.
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    signups: AtomicU64,
    logins: AtomicU64,
    active_conns: AtomicI64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_signup(&self) {
        self.signups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_login(&self) {
        self.logins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_conn(&self) {
        self.active_conns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_conn(&self) {
        self.active_conns.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "signups_total": self.signups.load(Ordering::Relaxed),
            "logins_total": self.logins.load(Ordering::Relaxed),
            "active_connections": self.active_conns.load(Ordering::Relaxed),
        })
    }
}
