// ============================
// crates/backend-lib/src/handlers/friends.rs
// ============================
//! Friendship and friend-request endpoints.
use crate::error::AppError;
use crate::storage::User;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct FriendEntry {
    username: String,
    online: bool,
}

#[derive(Debug, Serialize)]
pub struct FriendsResponse {
    friends: Vec<FriendEntry>,
}

#[derive(Debug, Serialize)]
pub struct FriendRequestsResponse {
    incoming: Vec<String>,
    outgoing: Vec<String>,
}

/// GET /friends
pub async fn list_friends(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let auth = state.auth.authenticate(&headers).await?;
    let friends = state.store.list_friends(auth.user_id).await?;

    let friends = friends
        .into_iter()
        .map(|friend| FriendEntry {
            online: state.presence.online(friend.id),
            username: friend.username,
        })
        .collect();
    Ok(Json(FriendsResponse { friends }))
}

/// POST /friends/{username}
pub async fn add_friend(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let auth = state.auth.authenticate(&headers).await?;
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::InvalidInput("friend username required".into()));
    }
    if username.eq_ignore_ascii_case(&auth.username) {
        return Err(AppError::InvalidInput("cannot add yourself".into()));
    }

    let friend = lookup_user(&state, username).await?;
    state.store.add_friendship(auth.user_id, friend.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /friend-requests
pub async fn list_requests(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let auth = state.auth.authenticate(&headers).await?;

    let incoming = state.store.list_incoming_friend_requests(auth.user_id).await?;
    let outgoing = state.store.list_outgoing_friend_requests(auth.user_id).await?;

    Ok(Json(FriendRequestsResponse {
        incoming: incoming.into_iter().map(|user| user.username).collect(),
        outgoing: outgoing.into_iter().map(|user| user.username).collect(),
    }))
}

/// POST /friend-requests/{username}
pub async fn create_request(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let auth = state.auth.authenticate(&headers).await?;
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::InvalidInput("username required".into()));
    }

    let receiver = lookup_user(&state, username).await?;
    state
        .store
        .create_friend_request(auth.user_id, receiver.id)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /friend-requests/{username}/{action}, action in accept|decline|cancel
pub async fn respond_request(
    State(state): State<AppState>,
    Path((username, action)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let auth = state.auth.authenticate(&headers).await?;
    let other = lookup_user(&state, username.trim()).await?;

    match action.trim() {
        // incoming request: the other user asked us
        "accept" => {
            state
                .store
                .accept_friend_request(other.id, auth.user_id)
                .await?;
        },
        "decline" => {
            state
                .store
                .delete_friend_request(other.id, auth.user_id)
                .await?;
        },
        // outgoing request: withdraw our own
        "cancel" => {
            state
                .store
                .delete_friend_request(auth.user_id, other.id)
                .await?;
        },
        _ => return Err(AppError::InvalidInput("unknown action".into())),
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn lookup_user(state: &AppState, username: &str) -> Result<User, AppError> {
    state
        .store
        .get_user_by_username(username)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))
}
