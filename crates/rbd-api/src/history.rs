use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use uuid::Uuid;

use rbd_types::api::{HistoryQuery, HistoryResponse};

use crate::auth::AppState;
use crate::error::{ApiError, blocking};
use crate::middleware::AuthUser;

/// Triggers exchanged with one friend, newest first.
pub async fn get_history(
    State(state): State<AppState>,
    Path(friend_user_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let friends = state.friends.clone();
    let (page, limit) = (query.page(), query.limit());
    let (history, total) =
        blocking(move || friends.history_with(user.user_id, friend_user_id, page, limit)).await?;

    Ok(Json(HistoryResponse { history, total }))
}
