// ============================
// crates/backend-lib/src/ws_router.rs
// ============================
//! Router assembly and the WebSocket join endpoint.
use crate::auth::AuthContext;
use crate::client::Client;
use crate::config::normalize_join_path;
use crate::error::AppError;
use crate::handlers::{accounts, friends, rooms};
use crate::AppState;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::collections::HashMap;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Build the full HTTP + WebSocket router.
pub fn create_router(state: AppState) -> Router {
    let join_path = normalize_join_path(&state.settings.server.join_path);
    let cors = cors_layer(&state.settings.server.allowed_origins);

    Router::new()
        .route("/signup", post(accounts::signup))
        .route("/login", post(accounts::login))
        .route("/logout", post(accounts::logout))
        .route("/password/change", post(accounts::change_password))
        .route("/friends", get(friends::list_friends))
        .route("/friends/:username", post(friends::add_friend))
        .route("/friend-requests", get(friends::list_requests))
        .route("/friend-requests/:username", post(friends::create_request))
        .route(
            "/friend-requests/:username/:action",
            post(friends::respond_request),
        )
        .route("/exists", get(rooms::room_exists))
        .route("/metrics", get(rooms::metrics_snapshot))
        .route(&join_path, get(join))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Origin checks are permissive unless a deployment lists its origins.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// GET /join?room=KEY: authenticate, upgrade, wire the client into its
/// room. Authentication runs before the upgrade, so an unauthorized join
/// never creates a room.
pub async fn join(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    ws: Option<WebSocketUpgrade>,
) -> Result<Response, AppError> {
    let room_key = params
        .get("room")
        .map(String::as_str)
        .unwrap_or("")
        .trim()
        .to_string();
    if room_key.is_empty() {
        return Err(AppError::InvalidInput("missing room query param".into()));
    }

    let auth = state.auth.authenticate(&headers).await?;

    let ws = ws.ok_or_else(|| AppError::InvalidInput("websocket upgrade required".into()))?;
    let max_frame_bytes = state.settings.chat.max_frame_bytes;
    Ok(ws
        .max_message_size(max_frame_bytes)
        .on_upgrade(move |socket| handle_connection(socket, state, auth, room_key)))
}

async fn handle_connection(
    socket: WebSocket,
    state: AppState,
    auth: AuthContext,
    room_key: String,
) {
    let room = state.hub.get_or_create(&room_key);
    state.presence.increment(auth.user_id);
    state.metrics.inc_conn();
    tracing::debug!(user = %auth.username, room = %room_key, "websocket connected");

    let presence = state.presence.clone();
    let metrics = state.metrics.clone();
    let user_id = auth.user_id;
    let username = auth.username.clone();
    let on_disconnect = Box::new(move || {
        presence.decrement(user_id);
        metrics.dec_conn();
        tracing::debug!(user = %username, "websocket disconnected");
    });

    let client = Client::new(
        Uuid::new_v4(),
        auth.username,
        room,
        state.hub.clone(),
        state.chat_limiter.clone(),
        state.settings.chat.clone(),
        on_disconnect,
    );
    client.run(socket).await;
}
