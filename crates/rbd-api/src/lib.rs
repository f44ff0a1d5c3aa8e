pub mod auth;
pub mod error;
pub mod friends;
pub mod history;
pub mod middleware;
pub mod notifications;

use axum::{
    Json, Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::AppState;
use crate::middleware::require_auth;

/// Builds the full HTTP surface over `state`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/refresh-token", post(auth::refresh_token))
        .route("/api/auth/update-push-token", post(auth::update_push_token))
        .route("/api/friends", get(friends::list_friends))
        .route("/api/friends/pending", get(friends::pending_requests))
        .route("/api/friends/search", post(friends::search_users))
        .route("/api/friends/request", post(friends::send_request))
        .route("/api/friends/accept", post(friends::accept_request))
        .route("/api/friends/reject", post(friends::reject_request))
        .route("/api/friends/mute", post(friends::mute_friend))
        .route("/api/friends/mute-all", post(friends::mute_all))
        .route("/api/friends/cooldown", post(friends::update_cooldown))
        .route("/api/friends/{friend_user_id}", delete(friends::remove_friend))
        .route("/api/notifications/trigger", post(notifications::trigger))
        .route("/api/notifications/cooldown/{friend_user_id}", get(notifications::check_cooldown))
        .route("/api/history/{friend_user_id}", get(history::get_history))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Return By Death API is running",
    }))
}
