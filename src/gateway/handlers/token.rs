//! Access token renewal

use std::sync::Arc;

use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::super::state::AppState;
use super::super::types::{
    ApiError, ApiResponse, ApiResult, RenewAccessTokenRequest, ValidatedJson, ok,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct RenewAccessTokenResponse {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
}

/// Issue a fresh access token for a live session
///
/// POST /api/v1/tokens/renew
#[utoipa::path(
    post,
    path = "/api/v1/tokens/renew",
    request_body = RenewAccessTokenRequest,
    responses(
        (status = 200, description = "New access token",
            body = ApiResponse<RenewAccessTokenResponse>),
        (status = 401, description = "Refresh token invalid, expired or revoked"),
        (status = 404, description = "Session not found")
    ),
    tag = "Tokens"
)]
pub async fn renew_access_token(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RenewAccessTokenRequest>,
) -> ApiResult<RenewAccessTokenResponse> {
    let refresh_payload = state
        .token_maker
        .verify_token(&req.refresh_token)
        .map_err(|e| ApiError::unauthorized(format!("invalid refresh token: {}", e)))?;

    let session = state.store.get_session(refresh_payload.id).await?;

    if session.is_blocked {
        tracing::warn!(session_id = %session.id, "Renewal refused: session blocked");
        return ApiError::unauthorized("blocked session").into_err();
    }
    if session.username != refresh_payload.username {
        return ApiError::unauthorized("incorrect session user").into_err();
    }
    if session.refresh_token != req.refresh_token {
        return ApiError::unauthorized("mismatched session token").into_err();
    }
    if Utc::now() > session.expires_at {
        return ApiError::unauthorized("expired session").into_err();
    }

    let (access_token, access_payload) = state
        .token_maker
        .create_token(&refresh_payload.username, state.access_token_duration)?;

    ok(RenewAccessTokenResponse {
        access_token,
        access_token_expires_at: access_payload.expired_at,
    })
}
