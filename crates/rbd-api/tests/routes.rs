use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use futures_util::future::BoxFuture;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use rbd_api::auth::{AppState, AppStateInner};
use rbd_core::memory::MemoryStore;
use rbd_core::store::PushDispatcher;
use rbd_core::{
    AuthService, CooldownLedger, FriendPolicy, FriendService, SessionConfig, SessionStore, Stores, TriggerEngine,
};
use rbd_types::events::PushMessage;

struct NoopDispatcher;

impl PushDispatcher for NoopDispatcher {
    fn send<'a>(&'a self, _: &'a str, _: &'a PushMessage) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

fn app() -> Router {
    let stores = Stores::shared(Arc::new(MemoryStore::new()));
    let ledger = CooldownLedger::new(stores.cooldowns.clone());
    let state: AppState = Arc::new(AppStateInner {
        auth: AuthService::new(stores.users.clone(), SessionStore::new(SessionConfig::default())),
        friends: FriendService::new(stores.clone(), ledger.clone(), FriendPolicy::default()),
        engine: TriggerEngine::new(stores, ledger, Arc::new(NoopDispatcher)),
    });
    rbd_api::router(state)
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register(app: &Router, username: &str) -> (String, String) {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "username": username, "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    (
        body["userId"].as_str().unwrap().to_string(),
        body["token"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn health_is_public() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let app = app();

    let (status, _) = call(&app, Method::GET, "/api/friends", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&app, Method::GET, "/api/friends", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn login_and_logout() {
    let app = app();
    register(&app, "alice").await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "nope123" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, _) = call(&app, Method::POST, "/api/auth/refresh-token", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::GET, "/api/friends", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let app = app();
    register(&app, "alice").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "username": "alice", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_exists");
}

#[tokio::test]
async fn friend_then_trigger_then_cooldown() {
    let app = app();
    let (alice_id, alice) = register(&app, "alice").await;
    let (bob_id, bob) = register(&app, "bob").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/friends/request",
        Some(&alice),
        Some(json!({ "targetUserId": bob_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let request_id = body["requestId"].as_str().unwrap().to_string();

    let (_, pending) = call(&app, Method::GET, "/api/friends/pending", Some(&bob), None).await;
    assert_eq!(pending[0]["username"], "alice");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/friends/accept",
        Some(&bob),
        Some(json!({ "requestId": request_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/friends/cooldown",
        Some(&bob),
        Some(json!({ "friendUserId": alice_id, "cooldownMinutes": 30 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, friends) = call(&app, Method::GET, "/api/friends", Some(&alice), None).await;
    assert_eq!(friends[0]["peerCooldownMinutes"], 30);
    assert_eq!(friends[0]["canTrigger"], true);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/notifications/trigger",
        Some(&alice),
        Some(json!({ "targetUserId": bob_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["historyRecorded"], true);
    // bob never registered a device
    assert_eq!(body["notificationSent"], false);
    let next = body["nextAvailableAt"].clone();

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/notifications/trigger",
        Some(&alice),
        Some(json!({ "targetUserId": bob_id })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "cooldown_active");
    assert_eq!(body["availableAt"], next);

    let uri = format!("/api/notifications/cooldown/{}", bob_id);
    let (_, body) = call(&app, Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(body["onCooldown"], true);

    let uri = format!("/api/history/{}?page=1&limit=10", alice_id);
    let (status, body) = call(&app, Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["history"][0]["senderUsername"], "alice");

    // malformed paging falls back to the defaults
    let uri = format!("/api/history/{}?page=abc&limit=500", alice_id);
    let (status, body) = call(&app, Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["history"].as_array().unwrap().len(), 1);

    let uri = format!("/api/friends/{}", alice_id);
    let (status, _) = call(&app, Method::DELETE, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/notifications/trigger",
        Some(&bob),
        Some(json!({ "targetUserId": alice_id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "not_friends");
}

#[tokio::test]
async fn mute_all_is_reported() {
    let app = app();
    let (alice_id, alice) = register(&app, "alice").await;
    let (bob_id, bob) = register(&app, "bob").await;

    let (_, body) = call(
        &app,
        Method::POST,
        "/api/friends/request",
        Some(&alice),
        Some(json!({ "targetUserId": bob_id })),
    )
    .await;
    call(
        &app,
        Method::POST,
        "/api/friends/accept",
        Some(&bob),
        Some(json!({ "requestId": body["requestId"] })),
    )
    .await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/friends/mute-all",
        Some(&bob),
        Some(json!({ "mutedAll": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/notifications/trigger",
        Some(&alice),
        Some(json!({ "targetUserId": bob_id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "user_muted_all");

    let (_, found) = call(
        &app,
        Method::POST,
        "/api/friends/search",
        Some(&bob),
        Some(json!({ "username": "ali" })),
    )
    .await;
    assert_eq!(found[0]["userId"], alice_id);
}
