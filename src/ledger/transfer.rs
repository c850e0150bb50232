//! Transfer Orchestrator
//!
//! `transfer_funds` moves `amount` from one account to another inside a single
//! unit of work:
//!
//! ```text
//! BEGIN
//!   INSERT transfer {from, to, amount}
//!   INSERT entry    {from, -amount}
//!   INSERT entry    {to,   +amount}
//!   UPDATE account  min(from, to)   -- row lock #1
//!   UPDATE account  max(from, to)   -- row lock #2
//! COMMIT
//! ```
//!
//! # Lock ordering
//!
//! Balance updates always touch the lower account id first. Every transfer
//! therefore acquires account row locks in the same global order, so A→B and
//! B→A running concurrently cannot wait on each other in a cycle. No
//! in-process lock is involved; the store's row locks do the serializing.
//!
//! # Failure
//!
//! Any error aborts and rolls back the whole unit of work and is returned
//! unchanged. Nothing is retried.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::error::LedgerError;
use super::models::{
    Account, CreateEntryParams, CreateTransferParams, Entry, Transfer, TransferTxParams,
    TransferTxResult,
};
use super::store::{LedgerStore, Tx, run_atomic_until};
use crate::core_types::{AccountId, Amount, EntryId, TransferId};

/// Signed balance change for one side of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceDelta {
    pub account_id: AccountId,
    pub amount: Amount,
}

/// Both balance updates of a transfer, lower account id first.
///
/// The source side is debited, the destination credited; the position in the
/// returned array depends only on the ids, never on the direction.
pub fn lock_order(params: &TransferTxParams) -> [BalanceDelta; 2] {
    let debit = BalanceDelta {
        account_id: params.from_account_id,
        amount: -params.amount,
    };
    let credit = BalanceDelta {
        account_id: params.to_account_id,
        amount: params.amount,
    };

    if debit.account_id < credit.account_id {
        [debit, credit]
    } else {
        [credit, debit]
    }
}

/// Reject requests the engine must never start.
pub fn validate_transfer(params: &TransferTxParams) -> Result<(), LedgerError> {
    if params.from_account_id == params.to_account_id {
        return Err(LedgerError::InvalidArgument(
            "source and destination account must differ".to_string(),
        ));
    }
    if params.amount <= 0 {
        return Err(LedgerError::InvalidArgument(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Account Balance Updater.
///
/// Must run inside an open unit of work and in `lock_order`.
async fn add_money(tx: &mut Tx, delta: BalanceDelta) -> Result<Account, LedgerError> {
    let account = tx
        .add_account_balance(delta.account_id, delta.amount)
        .await?;
    debug!(
        account_id = delta.account_id,
        delta = delta.amount,
        balance = account.balance,
        "Balance updated"
    );
    Ok(account)
}

/// Funds-transfer engine over any [`LedgerStore`]
pub struct TransferOrchestrator {
    store: Arc<dyn LedgerStore>,
    timeout: Option<Duration>,
}

impl TransferOrchestrator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            timeout: None,
        }
    }

    /// Cancel any transfer still uncommitted after `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run one transfer to commit, or fail with nothing applied.
    ///
    /// Dropping the returned future before it completes rolls the transfer back.
    pub async fn transfer_funds(
        &self,
        params: TransferTxParams,
    ) -> Result<TransferTxResult, LedgerError> {
        match self.timeout {
            Some(limit) => {
                self.transfer_funds_until(params, tokio::time::sleep(limit))
                    .await
            }
            None => self.execute(params, std::future::pending()).await,
        }
    }

    /// Like `transfer_funds`, but gives up with `Canceled` if `cancel`
    /// completes before the unit of work reaches commit. Once commit has
    /// started, its outcome is returned regardless of `cancel`.
    pub async fn transfer_funds_until<C>(
        &self,
        params: TransferTxParams,
        cancel: C,
    ) -> Result<TransferTxResult, LedgerError>
    where
        C: Future<Output = ()> + Send,
    {
        self.execute(params, cancel).await
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.store.get_account(id).await
    }

    pub async fn get_entry(&self, id: EntryId) -> Result<Entry, LedgerError> {
        self.store.get_entry(id).await
    }

    pub async fn get_transfer(&self, id: TransferId) -> Result<Transfer, LedgerError> {
        self.store.get_transfer(id).await
    }

    async fn execute<C>(
        &self,
        params: TransferTxParams,
        cancel: C,
    ) -> Result<TransferTxResult, LedgerError>
    where
        C: Future<Output = ()> + Send,
    {
        validate_transfer(&params)?;

        let result = run_atomic_until::<_, LedgerError, _, _>(
            self.store.as_ref(),
            move |tx| {
                Box::pin(async move {
                    let transfer = tx
                        .create_transfer(CreateTransferParams {
                            from_account_id: params.from_account_id,
                            to_account_id: params.to_account_id,
                            amount: params.amount,
                        })
                        .await?;

                    let from_entry = tx
                        .create_entry(CreateEntryParams {
                            account_id: params.from_account_id,
                            amount: -params.amount,
                        })
                        .await?;

                    let to_entry = tx
                        .create_entry(CreateEntryParams {
                            account_id: params.to_account_id,
                            amount: params.amount,
                        })
                        .await?;

                    let [first, second] = lock_order(&params);
                    let first_account = add_money(tx, first).await?;
                    let second_account = add_money(tx, second).await?;

                    let (from_account, to_account) = if first.account_id == params.from_account_id {
                        (first_account, second_account)
                    } else {
                        (second_account, first_account)
                    };

                    Ok(TransferTxResult {
                        transfer,
                        from_account,
                        to_account,
                        from_entry,
                        to_entry,
                    })
                })
            },
            cancel,
        )
        .await;

        match &result {
            Ok(r) => debug!(
                store = self.store.name(),
                transfer_id = r.transfer.id,
                from = params.from_account_id,
                to = params.to_account_id,
                amount = params.amount,
                "Transfer committed"
            ),
            Err(LedgerError::Canceled) => warn!(
                store = self.store.name(),
                from = params.from_account_id,
                to = params.to_account_id,
                amount = params.amount,
                "Transfer canceled before commit"
            ),
            Err(e) => warn!(
                store = self.store.name(),
                from = params.from_account_id,
                to = params.to_account_id,
                amount = params.amount,
                code = e.code(),
                error = %e,
                "Transfer rolled back"
            ),
        }

        result
    }
}
