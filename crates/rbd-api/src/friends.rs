use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use rbd_types::api::{
    MuteAllRequest, MuteFriendRequest, RespondFriendRequestBody, SearchUsersRequest, SendFriendRequestBody,
    SendFriendRequestResponse, SuccessResponse, UpdateCooldownRequest,
};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};
use crate::middleware::AuthUser;

pub async fn list_friends(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let friends = state.friends.clone();
    let list = blocking(move || friends.list_friends(user.user_id)).await?;
    Ok(Json(list))
}

pub async fn pending_requests(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let friends = state.friends.clone();
    let pending = blocking(move || friends.pending_requests(user.user_id)).await?;
    Ok(Json(pending))
}

pub async fn search_users(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<SearchUsersRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let friends = state.friends.clone();
    let users = blocking(move || friends.search_users(user.user_id, &req.username)).await?;
    Ok(Json(users))
}

pub async fn send_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<SendFriendRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let friends = state.friends.clone();
    let request_id = blocking(move || friends.send_request(user.user_id, req.target_user_id)).await?;
    Ok((StatusCode::CREATED, Json(SendFriendRequestResponse { request_id })))
}

pub async fn accept_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<RespondFriendRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let friends = state.friends.clone();
    blocking(move || friends.accept(user.user_id, req.request_id)).await?;
    Ok(Json(SuccessResponse::ok()))
}

pub async fn reject_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<RespondFriendRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let friends = state.friends.clone();
    blocking(move || friends.reject(user.user_id, req.request_id)).await?;
    Ok(Json(SuccessResponse::ok()))
}

pub async fn remove_friend(
    State(state): State<AppState>,
    Path(friend_user_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let friends = state.friends.clone();
    blocking(move || friends.remove(user.user_id, friend_user_id)).await?;
    Ok(Json(SuccessResponse::ok()))
}

pub async fn mute_friend(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<MuteFriendRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let friends = state.friends.clone();
    blocking(move || friends.set_mute(user.user_id, req.friend_user_id, req.muted)).await?;
    Ok(Json(SuccessResponse::ok()))
}

pub async fn mute_all(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<MuteAllRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let friends = state.friends.clone();
    blocking(move || friends.set_mute_all(user.user_id, req.muted_all)).await?;
    Ok(Json(SuccessResponse::ok()))
}

pub async fn update_cooldown(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<UpdateCooldownRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let friends = state.friends.clone();
    blocking(move || friends.set_cooldown(user.user_id, req.friend_user_id, req.cooldown_minutes)).await?;
    Ok(Json(SuccessResponse::ok()))
}
