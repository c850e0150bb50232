//! Entry handlers

use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, State},
};

use super::super::state::AppState;
use super::super::types::{ApiResponse, ApiResult, ok, require_id};
use super::ensure_owner;
use crate::ledger::Entry;
use crate::token::Payload;

/// Get a ledger entry on one of the caller's accounts
///
/// GET /api/v1/entries/{id}
#[utoipa::path(
    get,
    path = "/api/v1/entries/{id}",
    params(("id" = i64, Path, description = "Entry id")),
    responses(
        (status = 200, description = "Entry", body = ApiResponse<Entry>),
        (status = 403, description = "Entry is on another user's account"),
        (status = 404, description = "Entry not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Transfers"
)]
pub async fn get_entry(
    State(state): State<Arc<AppState>>,
    Extension(payload): Extension<Payload>,
    Path(id): Path<i64>,
) -> ApiResult<Entry> {
    let entry = state.orchestrator.get_entry(require_id(id)?).await?;
    let account = state.orchestrator.get_account(entry.account_id).await?;
    ensure_owner(&payload, &account)?;
    ok(entry)
}
