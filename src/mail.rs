//! Outbound email
//!
//! Sign-up stores a verification code and hands a [`VerifyEmailMessage`] to
//! an [`EmailSender`]. Delivery is outside the request's unit of work: a
//! failed send is logged and the user can still be verified later with the
//! stored code.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("email delivery failed: {0}")]
    Delivery(String),
}

/// Verification email for one new user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyEmailMessage {
    pub to: String,
    pub username: String,
    pub full_name: String,
    pub email_id: i64,
    pub secret_code: String,
}

impl VerifyEmailMessage {
    /// `GET` link consumed by `/api/v1/verify_email`
    pub fn link(&self, verify_email_url: &str) -> String {
        format!(
            "{}?email_id={}&secret_code={}",
            verify_email_url, self.email_id, self.secret_code
        )
    }
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_verify_email(&self, message: &VerifyEmailMessage) -> Result<(), MailError>;
}

/// Writes verification links to the log instead of sending mail
pub struct LogEmailSender {
    verify_email_url: String,
}

impl LogEmailSender {
    pub fn new(verify_email_url: impl Into<String>) -> Self {
        Self {
            verify_email_url: verify_email_url.into(),
        }
    }
}

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send_verify_email(&self, message: &VerifyEmailMessage) -> Result<(), MailError> {
        tracing::info!(
            to = %message.to,
            username = %message.username,
            email_id = message.email_id,
            link = %message.link(&self.verify_email_url),
            "Verification email"
        );
        Ok(())
    }
}

/// Fresh 32-character secret code
pub fn new_secret_code() -> String {
    Uuid::new_v4().simple().to_string()
}
