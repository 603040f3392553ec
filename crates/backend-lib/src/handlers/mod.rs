// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! HTTP API handlers: thin decode / authenticate / delegate / respond.

pub mod accounts;
pub mod friends;
pub mod rooms;

use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Resolve the client address for rate-limit keying. Behind a proxy the
/// first `X-Forwarded-For` hop wins; otherwise the socket peer address.
pub(crate) fn client_ip(headers: &HeaderMap, addr: SocketAddr) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    addr.ip().to_string()
}
