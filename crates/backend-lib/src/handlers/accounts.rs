// ============================
// crates/backend-lib/src/handlers/accounts.rs
// ============================
//! Account endpoints: signup, login, logout, password change.
use crate::auth::{generate_token, hash_password_secure, verify_password};
use crate::error::AppError;
use crate::handlers::client_ip;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    token: String,
    username: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasswordChangeRequest {
    current_password: String,
    new_password: String,
}

/// POST /signup
pub async fn signup(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    if !state.auth_limiter.allow(&client_ip(&headers, addr)) {
        return Err(AppError::RateLimited);
    }
    let Json(request) = payload.map_err(|err| AppError::InvalidInput(err.body_text()))?;

    let username = request.username.trim().to_string();
    let mut password = request.password.trim().to_string();
    if username.is_empty() || password.is_empty() {
        return Err(AppError::InvalidInput(
            "username and password are required".into(),
        ));
    }

    let hash = hash_password_secure(&mut password, state.settings.auth.scrypt_log_n)?;
    state.store.create_user(&username, &hash).await?;
    state.metrics.inc_signup();

    tracing::info!(%username, "user signed up");
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "username": username })),
    ))
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    if !state.auth_limiter.allow(&client_ip(&headers, addr)) {
        return Err(AppError::RateLimited);
    }
    let Json(request) = payload.map_err(|err| AppError::InvalidInput(err.body_text()))?;

    let username = request.username.trim();
    let password = request.password.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AppError::InvalidInput(
            "username and password are required".into(),
        ));
    }

    // Unknown user and wrong password are indistinguishable to the caller.
    let user = state.store.get_user_by_username(username).await?;
    let user = match user {
        Some(user) if verify_password(&user.password_hash, password) => user,
        _ => return Err(AppError::Unauthorized),
    };

    let token = generate_token();
    let expires_at = Utc::now() + state.settings.auth.token_ttl();
    state.store.create_session(user.id, &token, expires_at).await?;
    state.metrics.inc_login();

    tracing::info!(username = %user.username, "user logged in");
    Ok(Json(LoginResponse {
        token,
        username: user.username,
        expires_at,
    }))
}

/// POST /logout
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let auth = state.auth.authenticate(&headers).await?;
    state.store.delete_session(&auth.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /password/change
pub async fn change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<PasswordChangeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let auth = state.auth.authenticate(&headers).await?;
    let Json(request) = payload.map_err(|err| AppError::InvalidInput(err.body_text()))?;

    let current = request.current_password.trim();
    let mut new_password = request.new_password.trim().to_string();
    if current.is_empty() || new_password.is_empty() {
        return Err(AppError::InvalidInput(
            "both current and new passwords required".into(),
        ));
    }

    let user = state
        .store
        .get_user_by_id(auth.user_id)
        .await?
        .ok_or_else(|| AppError::Internal("authenticated user missing".into()))?;
    if !verify_password(&user.password_hash, current) {
        return Err(AppError::Unauthorized);
    }

    let hash = hash_password_secure(&mut new_password, state.settings.auth.scrypt_log_n)?;
    state.store.update_password(auth.user_id, &hash).await?;
    Ok(StatusCode::NO_CONTENT)
}
