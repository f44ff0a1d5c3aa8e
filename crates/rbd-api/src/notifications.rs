use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use rbd_types::api::{CooldownResponse, TriggerRequest, TriggerResponse};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};
use crate::middleware::AuthUser;

pub async fn trigger(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<TriggerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.engine.trigger(user.user_id, req.target_user_id).await?;

    Ok(Json(TriggerResponse {
        success: true,
        next_available_at: outcome.next_available_at,
        history_recorded: outcome.history_recorded(),
        notification_sent: outcome.notification_sent(),
    }))
}

pub async fn check_cooldown(
    State(state): State<AppState>,
    Path(friend_user_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = state.engine.clone();
    let status = blocking(move || engine.check_cooldown(user.user_id, friend_user_id)).await?;

    Ok(Json(CooldownResponse {
        on_cooldown: status.on_cooldown,
        available_at: status.available_at,
    }))
}
