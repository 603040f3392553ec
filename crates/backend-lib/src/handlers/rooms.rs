// ============================
// crates/backend-lib/src/handlers/rooms.rs
// ============================
//! Room probe and metrics endpoints.
use crate::error::AppError;
use crate::AppState;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use std::collections::HashMap;

/// GET /exists?room=KEY reports whether the hub currently holds KEY.
/// Never creates a room.
pub async fn room_exists(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let room = params.get("room").map(String::as_str).unwrap_or("").trim();
    if room.is_empty() {
        return Err(AppError::InvalidInput("missing room".into()));
    }
    if state.hub.exists(room) {
        Ok("ok")
    } else {
        Err(AppError::NotFound("not found".into()))
    }
}

/// GET /metrics serves the JSON counters and gauges.
pub async fn metrics_snapshot(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}
