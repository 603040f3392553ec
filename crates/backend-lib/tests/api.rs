// ============================
// crates/backend-lib/tests/api.rs
// ============================
//! End-to-end tests for the HTTP surface, driven through the router
//! without binding a socket.

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use backend_lib::config::Settings;
use backend_lib::storage::SqliteStore;
use backend_lib::{ws_router, AppState};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tower::ServiceExt;

async fn test_state(tune: impl FnOnce(&mut Settings)) -> AppState {
    let store = SqliteStore::open_in_memory().await.unwrap();
    store.migrate().await.unwrap();

    let mut settings = Settings::default();
    // keep password hashing fast in tests
    settings.auth.scrypt_log_n = 8;
    tune(&mut settings);

    AppState::new(store, settings)
}

fn test_app(state: AppState) -> Router {
    ws_router::create_router(state).layer(MockConnectInfo(SocketAddr::from((
        [127, 0, 0, 1],
        9999,
    ))))
}

async fn setup() -> (Router, AppState) {
    let state = test_state(|_| {}).await;
    (test_app(state.clone()), state)
}

fn post_json(path: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_json_auth(path: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_auth(path: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn get_auth(path: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn get(path: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

/// Run one request against a clone of the app, returning status and the
/// body parsed as JSON (or as a plain string for non-JSON bodies).
async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

async fn signup(app: &Router, username: &str, password: &str) {
    let (status, body) = send(
        app,
        post_json("/signup", json!({"username": username, "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
    assert_eq!(body["username"], username);
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        post_json("/login", json!({"username": username, "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    assert_eq!(body["username"], username);
    assert!(body["expires_at"].is_string());
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_signup_login_logout_round_trip() {
    let (app, _state) = setup().await;

    signup(&app, "alice", "password-one").await;
    let token = login(&app, "alice", "password-one").await;

    // the token authenticates
    let (status, _) = send(&app, get_auth("/friends", &token)).await;
    assert_eq!(status, StatusCode::OK);

    // logout invalidates it
    let (status, _) = send(&app, post_auth("/logout", &token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, get_auth("/friends", &token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // logging in again succeeds with a distinct token
    let second = login(&app, "alice", "password-one").await;
    assert_ne!(second, token);
}

#[tokio::test]
async fn test_signup_validation_and_conflicts() {
    let (app, _state) = setup().await;

    // empty fields
    let (status, body) = send(
        &app,
        post_json("/signup", json!({"username": "  ", "password": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    // unknown fields are rejected
    let (status, _) = send(
        &app,
        post_json(
            "/signup",
            json!({"username": "alice", "password": "pw", "admin": true}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // malformed JSON
    let request = Request::builder()
        .method("POST")
        .uri("/signup")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // duplicate username
    signup(&app, "alice", "password-one").await;
    let (status, body) = send(
        &app,
        post_json("/signup", json!({"username": "alice", "password": "other"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "user already exists");
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let (app, _state) = setup().await;
    signup(&app, "alice", "password-one").await;

    // wrong password and unknown user are indistinguishable
    let (status, _) = send(
        &app,
        post_json("/login", json!({"username": "alice", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        post_json("/login", json!({"username": "nobody", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_endpoints_are_rate_limited_by_ip() {
    let state = test_state(|settings| {
        settings.auth.rate_limit.limit = 2;
    })
    .await;
    let app = test_app(state);

    let (status, _) = send(
        &app,
        post_json("/login", json!({"username": "a", "password": "b"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(
        &app,
        post_json("/signup", json!({"username": "a", "password": "b"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // third hit from the same IP inside the window
    let (status, body) = send(
        &app,
        post_json("/login", json!({"username": "a", "password": "b"})),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "too many requests");
}

#[tokio::test]
async fn test_expired_session_is_rejected_and_evicted() {
    let (app, state) = setup().await;
    signup(&app, "alice", "password-one").await;

    let user = state
        .store
        .get_user_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    state
        .store
        .create_session(user.id, "stale-token", chrono::Utc::now() - chrono::Duration::hours(1))
        .await
        .unwrap();

    let (status, _) = send(&app, get_auth("/friends", "stale-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(state.store.get_session("stale-token").await.unwrap().is_none());
}

#[tokio::test]
async fn test_friend_request_lifecycle() {
    let (app, _state) = setup().await;
    signup(&app, "alice", "pw-alice").await;
    signup(&app, "bob", "pw-bob").await;
    let alice = login(&app, "alice", "pw-alice").await;
    let bob = login(&app, "bob", "pw-bob").await;

    // alice requests bob
    let (status, _) = send(&app, post_auth("/friend-requests/bob", &alice)).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    // duplicate, in either direction, conflicts
    let (status, _) = send(&app, post_auth("/friend-requests/bob", &alice)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = send(&app, post_auth("/friend-requests/alice", &bob)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // bob sees alice incoming, alice sees bob outgoing
    let (status, body) = send(&app, get_auth("/friend-requests", &bob)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["incoming"], json!(["alice"]));
    assert_eq!(body["outgoing"], json!([]));
    let (_, body) = send(&app, get_auth("/friend-requests", &alice)).await;
    assert_eq!(body["outgoing"], json!(["bob"]));

    // bob accepts
    let (status, _) = send(&app, post_auth("/friend-requests/alice/accept", &bob)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // both now list each other, offline
    let (_, body) = send(&app, get_auth("/friends", &alice)).await;
    assert_eq!(body["friends"], json!([{"username": "bob", "online": false}]));
    let (_, body) = send(&app, get_auth("/friends", &bob)).await;
    assert_eq!(body["friends"], json!([{"username": "alice", "online": false}]));

    // a new request between friends conflicts; accepting again is gone
    let (status, _) = send(&app, post_auth("/friend-requests/bob", &alice)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = send(&app, post_auth("/friend-requests/alice/accept", &bob)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_friend_request_decline_and_cancel() {
    let (app, _state) = setup().await;
    signup(&app, "alice", "pw-alice").await;
    signup(&app, "bob", "pw-bob").await;
    let alice = login(&app, "alice", "pw-alice").await;
    let bob = login(&app, "bob", "pw-bob").await;

    let (status, _) = send(&app, post_auth("/friend-requests/bob", &alice)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, _) = send(&app, post_auth("/friend-requests/alice/decline", &bob)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = send(&app, get_auth("/friends", &bob)).await;
    assert_eq!(body["friends"], json!([]));

    // request again, then the requester cancels
    let (status, _) = send(&app, post_auth("/friend-requests/bob", &alice)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, _) = send(&app, post_auth("/friend-requests/bob/cancel", &alice)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = send(&app, get_auth("/friend-requests", &bob)).await;
    assert_eq!(body["incoming"], json!([]));

    // unknown action and unknown user
    let (status, _) = send(&app, post_auth("/friend-requests/bob/ignore", &alice)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, post_auth("/friend-requests/ghost", &alice)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_add_friend_directly() {
    let (app, _state) = setup().await;
    signup(&app, "alice", "pw-alice").await;
    signup(&app, "bob", "pw-bob").await;
    let alice = login(&app, "alice", "pw-alice").await;

    let (status, _) = send(&app, post_auth("/friends/bob", &alice)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    // idempotent
    let (status, _) = send(&app, post_auth("/friends/bob", &alice)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, post_auth("/friends/alice", &alice)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, post_auth("/friends/ghost", &alice)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // unauthenticated
    let request = Request::builder()
        .method("POST")
        .uri("/friends/bob")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_friends_reflect_presence() {
    let (app, state) = setup().await;
    signup(&app, "alice", "pw-alice").await;
    signup(&app, "bob", "pw-bob").await;
    let bob = login(&app, "bob", "pw-bob").await;

    let alice = state
        .store
        .get_user_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    let bob_user = state.store.get_user_by_username("bob").await.unwrap().unwrap();
    state.store.add_friendship(alice.id, bob_user.id).await.unwrap();

    // alice comes online with two connections
    state.presence.increment(alice.id);
    state.presence.increment(alice.id);
    let (_, body) = send(&app, get_auth("/friends", &bob)).await;
    assert_eq!(body["friends"], json!([{"username": "alice", "online": true}]));

    // still online until the last connection drops
    state.presence.decrement(alice.id);
    let (_, body) = send(&app, get_auth("/friends", &bob)).await;
    assert_eq!(body["friends"][0]["online"], true);

    state.presence.decrement(alice.id);
    let (_, body) = send(&app, get_auth("/friends", &bob)).await;
    assert_eq!(body["friends"][0]["online"], false);
}

#[tokio::test]
async fn test_password_change_flow() {
    let (app, _state) = setup().await;
    signup(&app, "alice", "old-password").await;
    let token = login(&app, "alice", "old-password").await;

    // wrong current password
    let (status, _) = send(
        &app,
        post_json_auth(
            "/password/change",
            &token,
            json!({"current_password": "nope", "new_password": "new-password"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // empty new password
    let (status, _) = send(
        &app,
        post_json_auth(
            "/password/change",
            &token,
            json!({"current_password": "old-password", "new_password": " "}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        post_json_auth(
            "/password/change",
            &token,
            json!({"current_password": "old-password", "new_password": "new-password"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // old credentials no longer work, new ones do
    let (status, _) = send(
        &app,
        post_json("/login", json!({"username": "alice", "password": "old-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    login(&app, "alice", "new-password").await;
}

#[tokio::test]
async fn test_room_exists_probe() {
    let (app, state) = setup().await;

    let (status, _) = send(&app, get("/exists")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, get("/exists?room=lobby")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // probing never creates; only a join does
    state.hub.get_or_create("lobby");
    let (status, body) = send(&app, get("/exists?room=lobby")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn test_join_requires_room_and_auth() {
    let (app, state) = setup().await;

    let (status, _) = send(&app, get("/join")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // no bearer token: 401, and no room came into existence
    let (status, _) = send(&app, get("/join?room=secret")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, get("/exists?room=secret")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!state.hub.exists("secret"));

    // authenticated but not an upgrade request
    signup(&app, "alice", "pw-alice").await;
    let token = login(&app, "alice", "pw-alice").await;
    let (status, _) = send(&app, get_auth("/join?room=secret", &token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_counters() {
    let (app, _state) = setup().await;
    signup(&app, "alice", "pw-alice").await;
    let _token = login(&app, "alice", "pw-alice").await;

    let (status, body) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["signups_total"], 1);
    assert_eq!(body["logins_total"], 1);
    assert_eq!(body["active_connections"], 0);
}
