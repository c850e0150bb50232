//! Ledger Error Types
//!
//! One error type flows from the store through the transfer engine to the
//! gateway. The engine never produces `Unauthorized` / `Forbidden`; those are
//! raised by the transport layer's ownership checks.

use thiserror::Error;

/// Postgres SQLSTATE for `foreign_key_violation`
const PG_FOREIGN_KEY_VIOLATION: &str = "23503";
/// Postgres SQLSTATE for `unique_violation`
const PG_UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    // === Engine taxonomy ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Transfer canceled before commit")]
    Canceled,

    // === Row creation ===
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // === Transport-level authorization ===
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl LedgerError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        LedgerError::NotFound(format!("{} {}", entity, id))
    }

    /// Stable error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::InvalidArgument(_) => "INVALID_ARGUMENT",
            LedgerError::StorageFailure(_) => "STORAGE_FAILURE",
            LedgerError::Canceled => "CANCELED",
            LedgerError::AlreadyExists(_) => "ALREADY_EXISTS",
            LedgerError::Unauthorized(_) => "UNAUTHORIZED",
            LedgerError::Forbidden(_) => "FORBIDDEN",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::InvalidArgument(_) => 400,
            LedgerError::Unauthorized(_) => 401,
            LedgerError::Forbidden(_) => 403,
            LedgerError::NotFound(_) => 404,
            LedgerError::Canceled => 408,
            LedgerError::AlreadyExists(_) => 409,
            LedgerError::StorageFailure(_) => 500,
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => LedgerError::NotFound("row".to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some(PG_FOREIGN_KEY_VIOLATION) => {
                    LedgerError::NotFound(format!("referenced row: {}", db_err.message()))
                }
                Some(PG_UNIQUE_VIOLATION) => {
                    LedgerError::AlreadyExists(db_err.message().to_string())
                }
                _ => LedgerError::StorageFailure(e.to_string()),
            },
            _ => LedgerError::StorageFailure(e.to_string()),
        }
    }
}
