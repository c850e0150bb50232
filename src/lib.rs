//! Simple Bank - ledger-style banking backend
//!
//! Accounts hold integer balances; every funds movement is recorded as one
//! transfer plus two balancing entries, applied atomically.
//!
//! # Modules
//!
//! - [`core_types`] - Row identity and amount types
//! - [`ledger`] - Store capability, Postgres and in-memory stores, transfer engine
//! - [`token`] - Access token maker (JWT)
//! - [`validation`] / [`currency`] - Input rules
//! - [`password`] - argon2 password hashing
//! - [`mail`] - Verification email delivery
//! - [`gateway`] - axum HTTP API
//! - [`config`] / [`logging`] / [`db`] - Process bootstrap

// Core types - must be first!
pub mod core_types;

pub mod config;
pub mod currency;
pub mod db;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod mail;
pub mod password;
pub mod token;
pub mod validation;

// Convenient re-exports at crate root
pub use core_types::{AccountId, Amount, EntryId, TransferId};
pub use ledger::{
    LedgerError, LedgerStore, MemoryLedgerStore, PgLedgerStore, TransferOrchestrator,
    TransferTxParams, TransferTxResult,
};
