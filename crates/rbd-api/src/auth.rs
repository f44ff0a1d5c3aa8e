use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use rbd_core::{AuthService, FriendService, Session, TriggerEngine};
use rbd_types::api::{AuthResponse, LoginRequest, RegisterRequest, SuccessResponse, UpdatePushTokenRequest};

use crate::error::{ApiError, blocking};
use crate::middleware::AuthUser;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub auth: AuthService,
    pub friends: FriendService,
    pub engine: TriggerEngine,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.auth.register(&req.username, &req.password).await?;
    Ok((StatusCode::CREATED, Json(auth_response(session))))
}

pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> Result<impl IntoResponse, ApiError> {
    let session = state.auth.login(&req.username, &req.password).await?;
    Ok(Json(auth_response(session)))
}

pub async fn logout(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> impl IntoResponse {
    state.auth.logout(&user.token).await;
    Json(SuccessResponse::ok())
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    state.auth.refresh(&user.token).await?;
    Ok(Json(SuccessResponse::ok()))
}

pub async fn update_push_token(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<UpdatePushTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let auth = state.auth.clone();
    blocking(move || auth.update_push_token(user.user_id, &req.push_token)).await?;
    Ok(Json(SuccessResponse::ok()))
}

fn auth_response(session: Session) -> AuthResponse {
    AuthResponse {
        user_id: session.user_id,
        username: session.username,
        token: session.token,
    }
}
