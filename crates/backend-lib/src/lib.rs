// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core library for the termchat relay server.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod messages;
pub mod metrics;
pub mod presence;
pub mod room;
pub mod storage;
pub mod ws_router;

use crate::auth::{Authenticator, RateLimiter};
use crate::config::Settings;
use crate::hub::Hub;
use crate::metrics::Metrics;
use crate::presence::PresenceTracker;
use crate::storage::SqliteStore;
use std::sync::Arc;

/// Application state shared across all handlers. Constructed once at
/// startup and threaded explicitly; there are no ambient globals.
#[derive(Clone)]
pub struct AppState {
    /// Durable users, sessions, friendships, friend requests
    pub store: SqliteStore,
    /// Directory of live rooms
    pub hub: Arc<Hub>,
    /// Per-user active-connection counts
    pub presence: Arc<PresenceTracker>,
    /// Process counters served by /metrics
    pub metrics: Arc<Metrics>,
    /// Bearer-token resolution
    pub auth: Arc<Authenticator>,
    /// Admission control for /signup and /login, keyed by client IP
    pub auth_limiter: Arc<RateLimiter>,
    /// Admission control for chat sends, keyed per connection
    pub chat_limiter: Arc<RateLimiter>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(store: SqliteStore, settings: Settings) -> Self {
        let auth = Arc::new(Authenticator::new(store.clone()));
        let hub = Arc::new(Hub::new(settings.chat.broadcast_queue_depth));
        let auth_limiter = Arc::new(RateLimiter::new(
            settings.auth.rate_limit.limit,
            settings.auth.rate_limit_window(),
        ));
        let chat_limiter = Arc::new(RateLimiter::new(
            settings.chat.rate_limit.limit,
            settings.chat.rate_limit_window(),
        ));

        Self {
            store,
            hub,
            presence: Arc::new(PresenceTracker::new()),
            metrics: Arc::new(Metrics::new()),
            auth,
            auth_limiter,
            chat_limiter,
            settings: Arc::new(settings),
        }
    }
}
