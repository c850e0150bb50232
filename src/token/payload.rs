use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::TokenError;

/// Verified identity carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Payload {
    pub id: Uuid,
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

impl Payload {
    pub fn new(username: &str, duration: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            issued_at: now,
            expired_at: now + duration,
        }
    }

    pub fn valid(&self) -> Result<(), TokenError> {
        if Utc::now() > self.expired_at {
            return Err(TokenError::ExpiredToken);
        }
        Ok(())
    }
}
