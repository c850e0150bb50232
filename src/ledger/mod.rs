//! Ledger - accounts, entries, transfers and the transfer engine
//!
//! - [`store`] - `LedgerStore` / `UnitOfWork` capability traits
//! - [`postgres`] - Postgres-backed store
//! - [`memory`] - in-process store with emulated row locks
//! - [`transfer`] - `TransferOrchestrator` (the funds-transfer engine)

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;
pub mod transfer;

pub use error::LedgerError;
pub use memory::MemoryLedgerStore;
pub use models::{
    Account, CreateAccountParams, CreateEntryParams, CreateSessionParams, CreateTransferParams,
    CreateUserParams, CreateVerifyEmailParams, Entry, ListAccountsParams, Session, Transfer,
    TransferTxParams, TransferTxResult, User, VerifyEmail, VerifyEmailTxResult,
};
pub use postgres::PgLedgerStore;
pub use store::{LedgerStore, Tx, UnitOfWork, run_atomic, run_atomic_until};
pub use transfer::TransferOrchestrator;
