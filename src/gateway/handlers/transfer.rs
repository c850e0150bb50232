//! Transfer handlers

use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, State},
};

use super::super::state::AppState;
use super::super::types::{
    ApiError, ApiResponse, ApiResult, CreateTransferRequest, ValidatedJson, error_codes, ok,
    require_id,
};
use super::ensure_owner;
use crate::ledger::{Account, Transfer, TransferTxParams, TransferTxResult};
use crate::token::Payload;

/// Reject accounts not held in the requested currency
fn ensure_currency(account: &Account, currency: &str) -> Result<(), ApiError> {
    if account.currency != currency {
        return Err(ApiError::new(
            axum::http::StatusCode::BAD_REQUEST,
            error_codes::CURRENCY_MISMATCH,
            format!(
                "account [{}] currency mismatch: {} vs {}",
                account.id, account.currency, currency
            ),
        ));
    }
    Ok(())
}

/// Move money from one of the caller's accounts to any account
///
/// POST /api/v1/transfers
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    request_body = CreateTransferRequest,
    responses(
        (status = 200, description = "Transfer committed", body = ApiResponse<TransferTxResult>),
        (status = 400, description = "Invalid parameters or currency mismatch"),
        (status = 401, description = "Authentication failed"),
        (status = 403, description = "Source account belongs to another user"),
        (status = 404, description = "Account not found"),
        (status = 408, description = "Transfer canceled before commit")
    ),
    security(("bearer_auth" = [])),
    tag = "Transfers"
)]
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Extension(payload): Extension<Payload>,
    ValidatedJson(req): ValidatedJson<CreateTransferRequest>,
) -> ApiResult<TransferTxResult> {
    let from_account = state.orchestrator.get_account(req.from_account_id).await?;
    ensure_owner(&payload, &from_account)?;
    ensure_currency(&from_account, &req.currency)?;

    let to_account = state.orchestrator.get_account(req.to_account_id).await?;
    ensure_currency(&to_account, &req.currency)?;

    let result = state
        .orchestrator
        .transfer_funds(TransferTxParams::new(
            req.from_account_id,
            req.to_account_id,
            req.amount,
        ))
        .await?;

    tracing::info!(
        transfer_id = result.transfer.id,
        username = %payload.username,
        from = result.transfer.from_account_id,
        to = result.transfer.to_account_id,
        amount = result.transfer.amount,
        "Transfer completed"
    );
    ok(result)
}

/// Get a transfer the caller is a party to
///
/// GET /api/v1/transfers/{id}
#[utoipa::path(
    get,
    path = "/api/v1/transfers/{id}",
    params(("id" = i64, Path, description = "Transfer id")),
    responses(
        (status = 200, description = "Transfer", body = ApiResponse<Transfer>),
        (status = 403, description = "Caller owns neither account"),
        (status = 404, description = "Transfer not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Transfers"
)]
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    Extension(payload): Extension<Payload>,
    Path(id): Path<i64>,
) -> ApiResult<Transfer> {
    let transfer = state.orchestrator.get_transfer(require_id(id)?).await?;

    let from_account = state.orchestrator.get_account(transfer.from_account_id).await?;
    if from_account.owner != payload.username {
        let to_account = state.orchestrator.get_account(transfer.to_account_id).await?;
        ensure_owner(&payload, &to_account)?;
    }

    ok(transfer)
}
