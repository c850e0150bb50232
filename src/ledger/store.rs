//! Ledger Store capability
//!
//! Two seams:
//! - [`LedgerStore`]: plain row reads and single-row inserts, plus `begin()`
//! - [`UnitOfWork`]: the writes a transfer needs, inside one atomic scope
//!
//! Implementations are chosen at construction time
//! ([`PgLedgerStore`](super::PgLedgerStore) or
//! [`MemoryLedgerStore`](super::MemoryLedgerStore)) and used as
//! `Arc<dyn LedgerStore>`.

use std::future::Future;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::warn;

use super::error::LedgerError;
use uuid::Uuid;

use super::models::{
    Account, CreateAccountParams, CreateEntryParams, CreateSessionParams, CreateTransferParams,
    CreateUserParams, CreateVerifyEmailParams, Entry, ListAccountsParams, Session, Transfer, User,
    VerifyEmail, VerifyEmailTxResult,
};
use crate::core_types::{AccountId, Amount, EntryId, TransferId};

/// Open unit of work, owned by whoever called [`LedgerStore::begin`].
pub type Tx = Box<dyn UnitOfWork>;

/// Atomic, isolated scope against the store.
///
/// Row locks taken inside the scope are held until `commit` or `rollback`.
/// Dropping an unfinished unit of work rolls it back.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Insert a transfer row. Fails with `NotFound` if either account is missing.
    async fn create_transfer(&mut self, arg: CreateTransferParams)
    -> Result<Transfer, LedgerError>;

    /// Insert an entry row. Fails with `NotFound` if the account is missing.
    async fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, LedgerError>;

    /// `balance = balance + amount`, returning the updated row.
    ///
    /// Takes the account's row lock for the rest of the unit of work. Only
    /// the transfer engine calls this, in lower-id-first order.
    async fn add_account_balance(
        &mut self,
        account_id: AccountId,
        amount: Amount,
    ) -> Result<Account, LedgerError>;

    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Store name for logging
    fn name(&self) -> &'static str;

    async fn begin(&self) -> Result<Tx, LedgerError>;

    async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError>;

    async fn get_entry(&self, id: EntryId) -> Result<Entry, LedgerError>;

    async fn get_transfer(&self, id: TransferId) -> Result<Transfer, LedgerError>;

    async fn create_account(&self, arg: CreateAccountParams) -> Result<Account, LedgerError>;

    /// Accounts of one owner, ordered by id
    async fn list_accounts(&self, arg: ListAccountsParams) -> Result<Vec<Account>, LedgerError>;

    async fn create_user(&self, arg: CreateUserParams) -> Result<User, LedgerError>;

    async fn get_user(&self, username: &str) -> Result<User, LedgerError>;

    async fn create_session(&self, arg: CreateSessionParams) -> Result<Session, LedgerError>;

    async fn get_session(&self, id: Uuid) -> Result<Session, LedgerError>;

    async fn create_verify_email(
        &self,
        arg: CreateVerifyEmailParams,
    ) -> Result<VerifyEmail, LedgerError>;

    /// Consume an unused, unexpired code and mark its user's email verified,
    /// both or neither. A code that does not match fails with `InvalidArgument`.
    async fn verify_email(
        &self,
        email_id: i64,
        secret_code: &str,
    ) -> Result<VerifyEmailTxResult, LedgerError>;

    /// Cheap round trip used by the health endpoint
    async fn ping(&self) -> Result<(), LedgerError>;
}

/// Run `work` inside one unit of work.
///
/// Commits when `work` returns `Ok`. On `Err` the unit of work is rolled back
/// and the error is returned unchanged; a failing rollback is only logged.
/// If the returned future is dropped midway, the unit of work is dropped with
/// it and rolled back by the store.
pub async fn run_atomic<T, E, F>(store: &dyn LedgerStore, work: F) -> Result<T, E>
where
    F: for<'a> FnOnce(&'a mut Tx) -> BoxFuture<'a, Result<T, E>> + Send,
    T: Send,
    E: From<LedgerError> + std::fmt::Display + Send,
{
    run_atomic_until(store, work, std::future::pending()).await
}

/// [`run_atomic`] that gives up with `Canceled` if `cancel` completes first.
///
/// `cancel` is only observed while beginning and while `work` runs. Once
/// `work` returns `Ok`, commit is awaited to completion: the outcome of a
/// commit already sent to the store is always reported as is.
pub async fn run_atomic_until<T, E, F, C>(
    store: &dyn LedgerStore,
    work: F,
    cancel: C,
) -> Result<T, E>
where
    F: for<'a> FnOnce(&'a mut Tx) -> BoxFuture<'a, Result<T, E>> + Send,
    T: Send,
    E: From<LedgerError> + std::fmt::Display + Send,
    C: Future<Output = ()> + Send,
{
    let mut cancel = std::pin::pin!(cancel);

    let mut tx = tokio::select! {
        biased;
        _ = &mut cancel => return Err(LedgerError::Canceled.into()),
        tx = store.begin() => tx?,
    };

    let outcome = tokio::select! {
        biased;
        _ = &mut cancel => Err(E::from(LedgerError::Canceled)),
        result = work(&mut tx) => result,
    };

    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rb_err) = tx.rollback().await {
                warn!(
                    store = store.name(),
                    error = %rb_err,
                    cause = %err,
                    "Rollback failed"
                );
            }
            Err(err)
        }
    }
}
