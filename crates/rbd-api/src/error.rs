use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use rbd_core::CoreError;
use rbd_types::api::ErrorResponse;

/// Handler error. Wraps [`CoreError`] so handlers can use `?` on service
/// calls and still produce a JSON body with a stable error code.
#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl ApiError {
    pub fn unauthorized(reason: &'static str) -> Self {
        Self(CoreError::Unauthorized(reason))
    }

    pub fn internal(reason: impl std::fmt::Display) -> Self {
        Self(CoreError::Store(anyhow::anyhow!("{}", reason)))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CoreError::Validation(_) | CoreError::SelfRequest | CoreError::NotFriends => StatusCode::BAD_REQUEST,
            CoreError::NotFound(_) | CoreError::UserNotFound | CoreError::TargetNotFound => StatusCode::NOT_FOUND,
            CoreError::InvalidCredentials | CoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            CoreError::Forbidden(_)
            | CoreError::NotAParty
            | CoreError::TargetMutedYou
            | CoreError::TargetMutedAll => StatusCode::FORBIDDEN,
            CoreError::InvalidState(_)
            | CoreError::AlreadyExists(_)
            | CoreError::AlreadyFriends
            | CoreError::RequestAlreadySent
            | CoreError::RequestAlreadyReceived
            | CoreError::RequestRejected => StatusCode::CONFLICT,
            CoreError::CooldownActive { .. } => StatusCode::TOO_MANY_REQUESTS,
            CoreError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self.0 {
            CoreError::CooldownActive { available_at } => ErrorResponse {
                error: self.0.code().to_string(),
                available_at: Some(*available_at),
            },
            CoreError::Store(e) => {
                error!("Internal error: {:#}", e);
                ErrorResponse {
                    error: self.0.code().to_string(),
                    available_at: None,
                }
            }
            // validation failures report the reason instead of a code
            CoreError::Validation(reason) => ErrorResponse {
                error: reason.clone(),
                available_at: None,
            },
            other => ErrorResponse {
                error: other.code().to_string(),
                available_at: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Runs a synchronous service call off the async runtime.
pub async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, CoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::internal(e)
        })?
        .map_err(ApiError)
}
