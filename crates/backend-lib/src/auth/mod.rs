// ============================
// crates/backend-lib/src/auth/mod.rs
// ============================
//! Authentication: bearer token resolution, password hashing, session
//! tokens, and sliding-window rate limiting.

pub mod password;
pub mod rate_limit;
pub mod token;

pub use password::{hash_password, hash_password_secure, verify_password};
pub use rate_limit::RateLimiter;
pub use token::generate_token;

use crate::error::AppError;
use crate::storage::SqliteStore;
use axum::http::{header, HeaderMap};
use chrono::Utc;

/// The authenticated user resolved from a session token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub username: String,
    pub token: String,
}

/// Resolves `Authorization: Bearer <token>` headers against the session
/// table. Missing or malformed headers, unknown tokens, and expired
/// sessions all collapse into `Unauthorized`.
#[derive(Clone)]
pub struct Authenticator {
    store: SqliteStore,
}

impl Authenticator {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AppError> {
        let header = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized)?;
        let token = parse_bearer(header).ok_or(AppError::Unauthorized)?;

        let session = self
            .store
            .get_session(token)
            .await?
            .ok_or(AppError::Unauthorized)?;
        if session.expires_at <= Utc::now() {
            // expired sessions are evicted on the failing lookup
            let _ = self.store.delete_session(token).await;
            return Err(AppError::Unauthorized);
        }

        let user = self
            .store
            .get_user_by_id(session.user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(AuthContext {
            user_id: user.id,
            username: user.username,
            token: token.to_string(),
        })
    }
}

fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, rest) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
