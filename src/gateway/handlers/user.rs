//! User registration, login and email verification

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::super::state::AppState;
use super::super::types::{
    ApiError, ApiResponse, ApiResult, ClientMetadata, CreateUserRequest, LoginUserRequest,
    ValidatedJson, ValidatedQuery, VerifyEmailQuery, ok,
};
use crate::ledger::{
    CreateSessionParams, CreateUserParams, CreateVerifyEmailParams, LedgerError, User,
};
use crate::mail::{VerifyEmailMessage, new_secret_code};
use crate::password::{check_password, hash_password};

/// User as returned to clients (no password hash)
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    #[schema(example = "alice")]
    pub username: String,
    #[schema(example = "Alice Smith")]
    pub full_name: String,
    #[schema(example = "alice@example.com")]
    pub email: String,
    pub is_email_verified: bool,
    pub password_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            full_name: user.full_name,
            email: user.email,
            is_email_verified: user.is_email_verified,
            password_changed_at: user.password_changed_at,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginUserResponse {
    pub session_id: Uuid,
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyEmailResponse {
    pub is_verified: bool,
}

/// Register a new user
///
/// POST /api/v1/users
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Username or email already exists")
    ),
    tag = "Users"
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> ApiResult<UserResponse> {
    let hashed_password = hash_password(&req.password).map_err(|e| {
        tracing::error!("Password hashing failed: {}", e);
        ApiError::internal("Password hashing failed")
    })?;

    let user = state
        .store
        .create_user(CreateUserParams {
            username: req.username,
            hashed_password,
            full_name: req.full_name,
            email: req.email,
        })
        .await
        .inspect_err(|e| {
            if matches!(e, LedgerError::AlreadyExists(_)) {
                tracing::warn!("Registration attempt for existing user: {}", e);
            }
        })?;

    let verify_email = state
        .store
        .create_verify_email(CreateVerifyEmailParams {
            username: user.username.clone(),
            email: user.email.clone(),
            secret_code: new_secret_code(),
        })
        .await?;

    let message = VerifyEmailMessage {
        to: verify_email.email,
        username: user.username.clone(),
        full_name: user.full_name.clone(),
        email_id: verify_email.id,
        secret_code: verify_email.secret_code,
    };
    if let Err(e) = state.email_sender.send_verify_email(&message).await {
        tracing::error!(username = %user.username, error = %e, "Verification email not sent");
    }

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(UserResponse::from(user))),
    ))
}

/// Login user
///
/// Issues an access token and a refresh token. The refresh token is stored
/// as a session whose id is the token's payload id.
///
/// POST /api/v1/users/login
#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    request_body = LoginUserRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<LoginUserResponse>),
        (status = 401, description = "Invalid credentials"),
        (status = 404, description = "User not found")
    ),
    tag = "Users"
)]
pub async fn login_user(
    State(state): State<Arc<AppState>>,
    client: ClientMetadata,
    ValidatedJson(req): ValidatedJson<LoginUserRequest>,
) -> ApiResult<LoginUserResponse> {
    let user = state.store.get_user(&req.username).await?;

    check_password(&req.password, &user.hashed_password).map_err(|_| {
        tracing::warn!(username = %req.username, "Login failed: wrong password");
        ApiError::unauthorized("Invalid username or password")
    })?;

    let (access_token, access_payload) = state
        .token_maker
        .create_token(&user.username, state.access_token_duration)?;
    let (refresh_token, refresh_payload) = state
        .token_maker
        .create_token(&user.username, state.refresh_token_duration)?;

    let session = state
        .store
        .create_session(CreateSessionParams {
            id: refresh_payload.id,
            username: user.username.clone(),
            refresh_token: refresh_token.clone(),
            user_agent: client.user_agent,
            client_ip: client.client_ip,
            is_blocked: false,
            expires_at: refresh_payload.expired_at,
        })
        .await?;

    ok(LoginUserResponse {
        session_id: session.id,
        access_token,
        access_token_expires_at: access_payload.expired_at,
        refresh_token,
        refresh_token_expires_at: refresh_payload.expired_at,
        user: UserResponse::from(user),
    })
}

/// Verify a user's email address
///
/// Consumes the code from the verification link. A code can be used once,
/// and only before it expires.
///
/// GET /api/v1/verify_email?email_id=&secret_code=
#[utoipa::path(
    get,
    path = "/api/v1/verify_email",
    params(VerifyEmailQuery),
    responses(
        (status = 200, description = "Email verified", body = ApiResponse<VerifyEmailResponse>),
        (status = 400, description = "Invalid, used or expired code")
    ),
    tag = "Users"
)]
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<VerifyEmailQuery>,
) -> ApiResult<VerifyEmailResponse> {
    let result = state
        .store
        .verify_email(query.email_id, &query.secret_code)
        .await?;

    tracing::info!(username = %result.user.username, "Email verified");
    ok(VerifyEmailResponse {
        is_verified: result.user.is_email_verified,
    })
}
