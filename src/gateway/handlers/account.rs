//! Account handlers

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use super::super::state::AppState;
use super::super::types::{
    ApiResponse, ApiResult, CreateAccountRequest, ListAccountsQuery, ValidatedJson,
    ValidatedQuery, ok, require_id,
};
use super::ensure_owner;
use crate::ledger::{Account, CreateAccountParams, ListAccountsParams};
use crate::token::Payload;

/// Open an account for the authenticated user
///
/// POST /api/v1/accounts
#[utoipa::path(
    post,
    path = "/api/v1/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created with balance 0", body = ApiResponse<Account>),
        (status = 400, description = "Unsupported currency"),
        (status = 401, description = "Authentication failed"),
        (status = 409, description = "User already has an account in this currency")
    ),
    security(("bearer_auth" = [])),
    tag = "Accounts"
)]
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Extension(payload): Extension<Payload>,
    ValidatedJson(req): ValidatedJson<CreateAccountRequest>,
) -> ApiResult<Account> {
    let account = state
        .store
        .create_account(CreateAccountParams {
            owner: payload.username,
            balance: 0,
            currency: req.currency,
        })
        .await?;

    tracing::info!(
        account_id = account.id,
        owner = %account.owner,
        currency = %account.currency,
        "Account created"
    );
    Ok((StatusCode::CREATED, Json(ApiResponse::success(account))))
}

/// Get one of the caller's accounts
///
/// GET /api/v1/accounts/{id}
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{id}",
    params(("id" = i64, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account", body = ApiResponse<Account>),
        (status = 403, description = "Account belongs to another user"),
        (status = 404, description = "Account not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Accounts"
)]
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Extension(payload): Extension<Payload>,
    Path(id): Path<i64>,
) -> ApiResult<Account> {
    let account = state.orchestrator.get_account(require_id(id)?).await?;
    ensure_owner(&payload, &account)?;
    ok(account)
}

/// List the caller's accounts, ordered by id
///
/// GET /api/v1/accounts?page_id=1&page_size=5
#[utoipa::path(
    get,
    path = "/api/v1/accounts",
    params(ListAccountsQuery),
    responses(
        (status = 200, description = "One page of accounts", body = ApiResponse<Vec<Account>>),
        (status = 400, description = "Invalid paging parameters")
    ),
    security(("bearer_auth" = [])),
    tag = "Accounts"
)]
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Extension(payload): Extension<Payload>,
    ValidatedQuery(query): ValidatedQuery<ListAccountsQuery>,
) -> ApiResult<Vec<Account>> {
    let accounts = state
        .store
        .list_accounts(ListAccountsParams {
            owner: payload.username,
            limit: i64::from(query.page_size),
            offset: i64::from(query.page_id - 1) * i64::from(query.page_size),
        })
        .await?;
    ok(accounts)
}
