//! In-memory Ledger Store
//!
//! Behaves like the Postgres store at the unit-of-work boundary:
//! - `add_account_balance` takes the account's row lock (an owned async mutex
//!   guard) and keeps it until the unit of work ends
//! - writes are buffered and published on `commit`, discarded on rollback/drop
//! - ids come from sequences that do not rewind on rollback
//! - unique keys (username, email, owner + currency) are claimed through
//!   `DashMap::entry`, so concurrent creators cannot both win
//!
//! Locks are taken in whatever order the caller asks for, so an out-of-order
//! caller really deadlocks here as well.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::{DashMap, DashSet};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::error::LedgerError;
use super::models::{
    Account, CreateAccountParams, CreateEntryParams, CreateSessionParams, CreateTransferParams,
    CreateUserParams, CreateVerifyEmailParams, Entry, ListAccountsParams, Session, Transfer, User,
    VerifyEmail, VerifyEmailTxResult,
};
use super::store::{LedgerStore, Tx, UnitOfWork};
use crate::core_types::{AccountId, Amount, EntryId, TransferId};

/// Lifetime of a verification code, as the `verify_emails.expired_at` default
const VERIFY_EMAIL_TTL_MINUTES: i64 = 15;

/// One account row: immutable columns, committed balance, row lock
struct AccountSlot {
    account: Account,
    balance: AtomicI64,
    row_lock: Arc<Mutex<()>>,
}

impl AccountSlot {
    fn snapshot(&self) -> Account {
        Account {
            balance: self.balance.load(Ordering::SeqCst),
            ..self.account.clone()
        }
    }
}

#[derive(Default)]
struct MemoryInner {
    accounts: DashMap<AccountId, Arc<AccountSlot>>,
    entries: DashMap<EntryId, Entry>,
    transfers: DashMap<TransferId, Transfer>,
    users: DashMap<String, User>,
    /// email -> username
    emails: DashMap<String, String>,
    /// (owner, currency) -> account id
    account_keys: DashMap<(String, String), AccountId>,
    sessions: DashMap<Uuid, Session>,
    verify_emails: DashMap<i64, VerifyEmail>,
    account_seq: AtomicI64,
    entry_seq: AtomicI64,
    transfer_seq: AtomicI64,
    verify_email_seq: AtomicI64,
    /// Failure injection: balance updates on these accounts fail
    failing_accounts: DashSet<AccountId>,
}

impl MemoryInner {
    fn slot(&self, id: AccountId) -> Result<Arc<AccountSlot>, LedgerError> {
        self.accounts
            .get(&id)
            .map(|s| Arc::clone(s.value()))
            .ok_or_else(|| LedgerError::not_found("account", id))
    }

    fn require_account(&self, id: AccountId) -> Result<(), LedgerError> {
        if self.accounts.contains_key(&id) {
            Ok(())
        } else {
            Err(LedgerError::not_found("account", id))
        }
    }
}

/// Ledger store kept entirely in process memory
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    inner: Arc<MemoryInner>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later balance update of `account_id` fail with `StorageFailure`
    pub fn fail_balance_update_for(&self, account_id: AccountId) {
        self.inner.failing_accounts.insert(account_id);
    }

    pub fn clear_failures(&self) {
        self.inner.failing_accounts.clear();
    }

    pub fn entry_count(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn transfer_count(&self) -> usize {
        self.inner.transfers.len()
    }

    /// Committed entries of one account, ordered by id
    pub fn entries_for(&self, account_id: AccountId) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self
            .inner
            .entries
            .iter()
            .filter(|e| e.account_id == account_id)
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by_key(|e| e.id);
        entries
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    fn name(&self) -> &'static str {
        "Memory"
    }

    async fn begin(&self) -> Result<Tx, LedgerError> {
        Ok(Box::new(MemoryUnitOfWork {
            inner: Arc::clone(&self.inner),
            locks: HashMap::new(),
            balances: HashMap::new(),
            entries: Vec::new(),
            transfers: Vec::new(),
        }))
    }

    async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.inner.slot(id).map(|slot| slot.snapshot())
    }

    async fn get_entry(&self, id: EntryId) -> Result<Entry, LedgerError> {
        self.inner
            .entries
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or_else(|| LedgerError::not_found("entry", id))
    }

    async fn get_transfer(&self, id: TransferId) -> Result<Transfer, LedgerError> {
        self.inner
            .transfers
            .get(&id)
            .map(|t| t.value().clone())
            .ok_or_else(|| LedgerError::not_found("transfer", id))
    }

    async fn create_account(&self, arg: CreateAccountParams) -> Result<Account, LedgerError> {
        if !self.inner.users.contains_key(&arg.owner) {
            return Err(LedgerError::not_found("user", &arg.owner));
        }
        let key = (arg.owner.clone(), arg.currency.clone());
        let claim = match self.inner.account_keys.entry(key) {
            MapEntry::Occupied(_) => {
                return Err(LedgerError::AlreadyExists(format!(
                    "account {} for owner {}",
                    arg.currency, arg.owner
                )));
            }
            MapEntry::Vacant(e) => e,
        };

        let id = self.inner.account_seq.fetch_add(1, Ordering::SeqCst) + 1;
        claim.insert(id);
        let account = Account {
            id,
            owner: arg.owner,
            balance: arg.balance,
            currency: arg.currency,
            created_at: Utc::now(),
        };
        self.inner.accounts.insert(
            id,
            Arc::new(AccountSlot {
                account: account.clone(),
                balance: AtomicI64::new(arg.balance),
                row_lock: Arc::new(Mutex::new(())),
            }),
        );

        Ok(account)
    }

    async fn list_accounts(&self, arg: ListAccountsParams) -> Result<Vec<Account>, LedgerError> {
        let mut accounts: Vec<Account> = self
            .inner
            .accounts
            .iter()
            .filter(|s| s.account.owner == arg.owner)
            .map(|s| s.snapshot())
            .collect();
        accounts.sort_by_key(|a| a.id);

        Ok(accounts
            .into_iter()
            .skip(arg.offset.max(0) as usize)
            .take(arg.limit.max(0) as usize)
            .collect())
    }

    async fn create_user(&self, arg: CreateUserParams) -> Result<User, LedgerError> {
        match self.inner.emails.entry(arg.email.clone()) {
            MapEntry::Occupied(e) => {
                return Err(LedgerError::AlreadyExists(format!("email {}", e.key())));
            }
            MapEntry::Vacant(e) => {
                e.insert(arg.username.clone());
            }
        }

        let now = Utc::now();
        let user = User {
            username: arg.username.clone(),
            hashed_password: arg.hashed_password,
            full_name: arg.full_name,
            email: arg.email,
            is_email_verified: false,
            password_changed_at: now,
            created_at: now,
        };

        match self.inner.users.entry(arg.username) {
            MapEntry::Occupied(e) => {
                let err = LedgerError::AlreadyExists(format!("username {}", e.key()));
                drop(e);
                // Release the email claimed above
                self.inner.emails.remove(&user.email);
                Err(err)
            }
            MapEntry::Vacant(e) => {
                e.insert(user.clone());
                Ok(user)
            }
        }
    }

    async fn get_user(&self, username: &str) -> Result<User, LedgerError> {
        self.inner
            .users
            .get(username)
            .map(|u| u.value().clone())
            .ok_or_else(|| LedgerError::not_found("user", username))
    }

    async fn create_session(&self, arg: CreateSessionParams) -> Result<Session, LedgerError> {
        if !self.inner.users.contains_key(&arg.username) {
            return Err(LedgerError::not_found("user", &arg.username));
        }

        let session = Session {
            id: arg.id,
            username: arg.username,
            refresh_token: arg.refresh_token,
            user_agent: arg.user_agent,
            client_ip: arg.client_ip,
            is_blocked: arg.is_blocked,
            expires_at: arg.expires_at,
            created_at: Utc::now(),
        };

        match self.inner.sessions.entry(arg.id) {
            MapEntry::Occupied(e) => {
                Err(LedgerError::AlreadyExists(format!("session {}", e.key())))
            }
            MapEntry::Vacant(e) => {
                e.insert(session.clone());
                Ok(session)
            }
        }
    }

    async fn get_session(&self, id: Uuid) -> Result<Session, LedgerError> {
        self.inner
            .sessions
            .get(&id)
            .map(|s| s.value().clone())
            .ok_or_else(|| LedgerError::not_found("session", id))
    }

    async fn create_verify_email(
        &self,
        arg: CreateVerifyEmailParams,
    ) -> Result<VerifyEmail, LedgerError> {
        if !self.inner.users.contains_key(&arg.username) {
            return Err(LedgerError::not_found("user", &arg.username));
        }

        let now = Utc::now();
        let verify_email = VerifyEmail {
            id: self.inner.verify_email_seq.fetch_add(1, Ordering::SeqCst) + 1,
            username: arg.username,
            email: arg.email,
            secret_code: arg.secret_code,
            is_used: false,
            created_at: now,
            expired_at: now + chrono::Duration::minutes(VERIFY_EMAIL_TTL_MINUTES),
        };
        self.inner
            .verify_emails
            .insert(verify_email.id, verify_email.clone());

        Ok(verify_email)
    }

    async fn verify_email(
        &self,
        email_id: i64,
        secret_code: &str,
    ) -> Result<VerifyEmailTxResult, LedgerError> {
        let invalid =
            || LedgerError::InvalidArgument("invalid or expired verification code".to_string());

        // The row guard serializes concurrent attempts on the same code
        let mut row = self.inner.verify_emails.get_mut(&email_id).ok_or_else(invalid)?;
        if row.is_used || row.secret_code != secret_code || row.expired_at <= Utc::now() {
            return Err(invalid());
        }

        let mut user = self
            .inner
            .users
            .get_mut(&row.username)
            .ok_or_else(|| LedgerError::not_found("user", &row.username))?;
        row.is_used = true;
        user.is_email_verified = true;

        Ok(VerifyEmailTxResult {
            user: user.clone(),
            verify_email: row.clone(),
        })
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}

/// Buffered unit of work holding row locks until it ends
pub struct MemoryUnitOfWork {
    inner: Arc<MemoryInner>,
    locks: HashMap<AccountId, OwnedMutexGuard<()>>,
    /// Post-update balance of every account touched so far
    balances: HashMap<AccountId, Amount>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn create_transfer(
        &mut self,
        arg: CreateTransferParams,
    ) -> Result<Transfer, LedgerError> {
        self.inner.require_account(arg.from_account_id)?;
        self.inner.require_account(arg.to_account_id)?;
        if arg.amount <= 0 {
            return Err(LedgerError::StorageFailure(
                "transfers.amount violates check constraint".to_string(),
            ));
        }

        let transfer = Transfer {
            id: self.inner.transfer_seq.fetch_add(1, Ordering::SeqCst) + 1,
            from_account_id: arg.from_account_id,
            to_account_id: arg.to_account_id,
            amount: arg.amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn create_entry(&mut self, arg: CreateEntryParams) -> Result<Entry, LedgerError> {
        self.inner.require_account(arg.account_id)?;

        let entry = Entry {
            id: self.inner.entry_seq.fetch_add(1, Ordering::SeqCst) + 1,
            account_id: arg.account_id,
            amount: arg.amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn add_account_balance(
        &mut self,
        account_id: AccountId,
        amount: Amount,
    ) -> Result<Account, LedgerError> {
        let slot = self.inner.slot(account_id)?;

        if !self.locks.contains_key(&account_id) {
            let guard = Arc::clone(&slot.row_lock).lock_owned().await;
            self.locks.insert(account_id, guard);
        }

        if self.inner.failing_accounts.contains(&account_id) {
            return Err(LedgerError::StorageFailure(format!(
                "injected failure updating account {}",
                account_id
            )));
        }

        let current = match self.balances.get(&account_id) {
            Some(balance) => *balance,
            None => slot.balance.load(Ordering::SeqCst),
        };
        let updated = current.checked_add(amount).ok_or_else(|| {
            LedgerError::StorageFailure(format!("balance out of range for account {}", account_id))
        })?;
        self.balances.insert(account_id, updated);

        Ok(Account {
            balance: updated,
            ..slot.account.clone()
        })
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        let this = *self;

        // Publish while every touched row lock is still held.
        for (account_id, balance) in &this.balances {
            let slot = this.inner.slot(*account_id)?;
            slot.balance.store(*balance, Ordering::SeqCst);
        }
        for transfer in this.transfers {
            this.inner.transfers.insert(transfer.id, transfer);
        }
        for entry in this.entries {
            this.inner.entries.insert(entry.id, entry);
        }

        drop(this.locks);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        Ok(())
    }
}
