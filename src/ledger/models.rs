//! Ledger rows and operation parameters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::core_types::{AccountId, Amount, EntryId, TransferId};

/// Bank account. `balance` is only ever changed inside a transfer unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Account {
    #[schema(example = 1)]
    pub id: AccountId,
    #[schema(example = "alice")]
    pub owner: String,
    #[schema(example = 100)]
    pub balance: Amount,
    #[schema(example = "USD")]
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Immutable ledger line item: negative = debit, positive = credit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Entry {
    pub id: EntryId,
    pub account_id: AccountId,
    #[schema(example = -30)]
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

/// Immutable record of one funds movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Transfer {
    pub id: TransferId,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    /// Always > 0
    #[schema(example = 30)]
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

/// Bank user. The password hash never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub username: String,
    pub hashed_password: String,
    pub full_name: String,
    pub email: String,
    pub is_email_verified: bool,
    pub password_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Login session backing one refresh token. `id` is the refresh token's id.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub username: String,
    pub refresh_token: String,
    pub user_agent: String,
    pub client_ip: String,
    pub is_blocked: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Pending or used email verification code
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct VerifyEmail {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub secret_code: String,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub hashed_password: String,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    pub id: Uuid,
    pub username: String,
    pub refresh_token: String,
    pub user_agent: String,
    pub client_ip: String,
    pub is_blocked: bool,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateVerifyEmailParams {
    pub username: String,
    pub email: String,
    pub secret_code: String,
}

/// Both rows changed by a successful verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyEmailTxResult {
    pub user: User,
    pub verify_email: VerifyEmail,
}

#[derive(Debug, Clone)]
pub struct CreateAccountParams {
    pub owner: String,
    pub balance: Amount,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct ListAccountsParams {
    pub owner: String,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct CreateTransferParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Amount,
}

#[derive(Debug, Clone, Copy)]
pub struct CreateEntryParams {
    pub account_id: AccountId,
    pub amount: Amount,
}

/// Input of `TransferOrchestrator::transfer_funds`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Amount,
}

impl TransferTxParams {
    pub fn new(from_account_id: AccountId, to_account_id: AccountId, amount: Amount) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }
}

/// Everything one committed transfer produced.
///
/// `from_*` / `to_*` follow the request direction, not the lock order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}
