//! Access tokens
//!
//! [`Maker`] issues and verifies tokens; [`JwtMaker`] is the HS256 JWT
//! implementation. Handlers only ever see the verified [`Payload`].

mod jwt;
mod payload;

pub use jwt::JwtMaker;
pub use payload::Payload;

use chrono::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is invalid")]
    InvalidToken,

    #[error("token has expired")]
    ExpiredToken,

    #[error("invalid key size: must be at least {0} characters")]
    InvalidKeySize(usize),

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

pub trait Maker: Send + Sync {
    /// Issue a token for `username`, valid for `duration`
    fn create_token(&self, username: &str, duration: Duration)
    -> Result<(String, Payload), TokenError>;

    fn verify_token(&self, token: &str) -> Result<Payload, TokenError>;
}
