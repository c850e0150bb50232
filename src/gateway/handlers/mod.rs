//! HTTP handlers, one submodule per resource

pub mod account;
pub mod entry;
pub mod health;
pub mod token;
pub mod transfer;
pub mod user;

pub use account::{create_account, get_account, list_accounts};
pub use entry::get_entry;
pub use health::{HealthResponse, health_check};
pub use token::{RenewAccessTokenResponse, renew_access_token};
pub use transfer::{create_transfer, get_transfer};
pub use user::{
    LoginUserResponse, UserResponse, VerifyEmailResponse, create_user, login_user, verify_email,
};

use crate::ledger::{Account, LedgerError};
use crate::token::Payload;

/// The authenticated user must own `account`
pub(crate) fn ensure_owner(payload: &Payload, account: &Account) -> Result<(), LedgerError> {
    if account.owner != payload.username {
        return Err(LedgerError::Forbidden(
            "account doesn't belong to the authenticated user".to_string(),
        ));
    }
    Ok(())
}
