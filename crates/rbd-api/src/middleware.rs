use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::AppState;
use crate::error::ApiError;

/// The caller resolved from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub token: String,
}

/// Extract and validate the session token from the Authorization header.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::unauthorized("authorization header required"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::unauthorized("invalid authorization header format"))?
        .to_string();

    let user_id = state.auth.authenticate(&token).await?;

    req.extensions_mut().insert(AuthUser { user_id, token });
    Ok(next.run(req).await)
}
