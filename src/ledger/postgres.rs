//! PostgreSQL Ledger Store
//!
//! Row locks come from Postgres itself: `UPDATE accounts ... WHERE id = $1`
//! locks the account row until the surrounding transaction ends.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::error::LedgerError;
use super::models::{
    Account, CreateAccountParams, CreateEntryParams, CreateSessionParams, CreateTransferParams,
    CreateUserParams, CreateVerifyEmailParams, Entry, ListAccountsParams, Session, Transfer, User,
    VerifyEmail, VerifyEmailTxResult,
};
use super::store::{LedgerStore, Tx, UnitOfWork};
use crate::core_types::{AccountId, Amount, EntryId, TransferId};

const ACCOUNT_COLUMNS: &str = "id, owner, balance, currency, created_at";
const ENTRY_COLUMNS: &str = "id, account_id, amount, created_at";
const TRANSFER_COLUMNS: &str = "id, from_account_id, to_account_id, amount, created_at";
const USER_COLUMNS: &str = "username, hashed_password, full_name, email, is_email_verified, \
                            password_changed_at, created_at";
const SESSION_COLUMNS: &str = "id, username, refresh_token, user_agent, client_ip, is_blocked, \
                               expires_at, created_at";
const VERIFY_EMAIL_COLUMNS: &str =
    "id, username, email, secret_code, is_used, created_at, expired_at";

/// Ledger store backed by a Postgres connection pool
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    fn name(&self) -> &'static str {
        "Postgres"
    }

    async fn begin(&self) -> Result<Tx, LedgerError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LedgerError::not_found("account", id))
    }

    async fn get_entry(&self, id: EntryId) -> Result<Entry, LedgerError> {
        sqlx::query_as::<_, Entry>(&format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| LedgerError::not_found("entry", id))
    }

    async fn get_transfer(&self, id: TransferId) -> Result<Transfer, LedgerError> {
        sqlx::query_as::<_, Transfer>(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LedgerError::not_found("transfer", id))
    }

    async fn create_account(&self, arg: CreateAccountParams) -> Result<Account, LedgerError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "INSERT INTO accounts (owner, balance, currency) VALUES ($1, $2, $3)
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(&arg.owner)
        .bind(arg.balance)
        .bind(&arg.currency)
        .fetch_one(&self.pool)
        .await?;

        Ok(account)
    }

    async fn list_accounts(&self, arg: ListAccountsParams) -> Result<Vec<Account>, LedgerError> {
        let accounts = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE owner = $1
             ORDER BY id LIMIT $2 OFFSET $3"
        ))
        .bind(&arg.owner)
        .bind(arg.limit)
        .bind(arg.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    async fn create_user(&self, arg: CreateUserParams) -> Result<User, LedgerError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, hashed_password, full_name, email)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&arg.username)
        .bind(&arg.hashed_password)
        .bind(&arg.full_name)
        .bind(&arg.email)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user(&self, username: &str) -> Result<User, LedgerError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LedgerError::not_found("user", username))
    }

    async fn create_session(&self, arg: CreateSessionParams) -> Result<Session, LedgerError> {
        let session = sqlx::query_as::<_, Session>(&format!(
            "INSERT INTO sessions
                 (id, username, refresh_token, user_agent, client_ip, is_blocked, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(arg.id)
        .bind(&arg.username)
        .bind(&arg.refresh_token)
        .bind(&arg.user_agent)
        .bind(&arg.client_ip)
        .bind(arg.is_blocked)
        .bind(arg.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    async fn get_session(&self, id: Uuid) -> Result<Session, LedgerError> {
        sqlx::query_as::<_, Session>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LedgerError::not_found("session", id))
    }

    async fn create_verify_email(
        &self,
        arg: CreateVerifyEmailParams,
    ) -> Result<VerifyEmail, LedgerError> {
        let verify_email = sqlx::query_as::<_, VerifyEmail>(&format!(
            "INSERT INTO verify_emails (username, email, secret_code) VALUES ($1, $2, $3)
             RETURNING {VERIFY_EMAIL_COLUMNS}"
        ))
        .bind(&arg.username)
        .bind(&arg.email)
        .bind(&arg.secret_code)
        .fetch_one(&self.pool)
        .await?;

        Ok(verify_email)
    }

    async fn verify_email(
        &self,
        email_id: i64,
        secret_code: &str,
    ) -> Result<VerifyEmailTxResult, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let verify_email = sqlx::query_as::<_, VerifyEmail>(&format!(
            "UPDATE verify_emails SET is_used = TRUE
             WHERE id = $1 AND secret_code = $2 AND is_used = FALSE AND expired_at > now()
             RETURNING {VERIFY_EMAIL_COLUMNS}"
        ))
        .bind(email_id)
        .bind(secret_code)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            LedgerError::InvalidArgument("invalid or expired verification code".to_string())
        })?;

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_email_verified = TRUE WHERE username = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&verify_email.username)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| LedgerError::not_found("user", &verify_email.username))?;

        tx.commit().await?;
        Ok(VerifyEmailTxResult { user, verify_email })
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// One open Postgres transaction (READ COMMITTED, the server default)
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn create_transfer(
        &mut self,
        arg: CreateTransferParams,
    ) -> Result<Transfer, LedgerError> {
        let transfer = sqlx::query_as::<_, Transfer>(&format!(
            "INSERT INTO transfers (from_account_id, to_account_id, amount)
             VALUES ($1, $2, $3)
             RETURNING {TRANSFER_COLUMNS}"
        ))
        .bind(arg.from_account_id)
        .bind(arg.to_account_id)
        .bind(arg.amount)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(transfer)
    }

    async fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, LedgerError> {
        let entry = sqlx::query_as::<_, Entry>(&format!(
            "INSERT INTO entries (account_id, amount) VALUES ($1, $2)
             RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(arg.account_id)
        .bind(arg.amount)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(entry)
    }

    async fn add_account_balance(
        &mut self,
        account_id: AccountId,
        amount: Amount,
    ) -> Result<Account, LedgerError> {
        // Single statement: read, add and write happen under the row lock.
        sqlx::query_as::<_, Account>(&format!(
            "UPDATE accounts SET balance = balance + $1 WHERE id = $2
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(amount)
        .bind(account_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| LedgerError::not_found("account", account_id))
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
