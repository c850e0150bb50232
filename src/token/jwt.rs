use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Maker, Payload, TokenError};
use crate::config::MIN_SECRET_KEY_SIZE;

/// Registered JWT claims a [`Payload`] is encoded as
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    jti: Uuid,
    sub: String,
    iat: i64,
    exp: i64,
}

impl From<&Payload> for Claims {
    fn from(p: &Payload) -> Self {
        Self {
            jti: p.id,
            sub: p.username.clone(),
            iat: p.issued_at.timestamp(),
            exp: p.expired_at.timestamp(),
        }
    }
}

impl TryFrom<Claims> for Payload {
    type Error = TokenError;

    fn try_from(c: Claims) -> Result<Self, Self::Error> {
        let issued_at =
            DateTime::<Utc>::from_timestamp(c.iat, 0).ok_or(TokenError::InvalidToken)?;
        let expired_at =
            DateTime::<Utc>::from_timestamp(c.exp, 0).ok_or(TokenError::InvalidToken)?;
        Ok(Self {
            id: c.jti,
            username: c.sub,
            issued_at,
            expired_at,
        })
    }
}

/// HS256 JWT maker
pub struct JwtMaker {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtMaker {
    pub fn new(secret_key: &str) -> Result<Self, TokenError> {
        if secret_key.len() < MIN_SECRET_KEY_SIZE {
            return Err(TokenError::InvalidKeySize(MIN_SECRET_KEY_SIZE));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret_key.as_bytes()),
            validation,
        })
    }
}

impl Maker for JwtMaker {
    fn create_token(
        &self,
        username: &str,
        duration: Duration,
    ) -> Result<(String, Payload), TokenError> {
        let payload = Payload::new(username, duration);
        let token = encode(
            &Header::new(Algorithm::HS256),
            &Claims::from(&payload),
            &self.encoding_key,
        )
        .map_err(|e| TokenError::Encoding(e.to_string()))?;
        Ok((token, payload))
    }

    fn verify_token(&self, token: &str) -> Result<Payload, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::ExpiredToken,
                _ => TokenError::InvalidToken,
            }
        })?;
        Payload::try_from(data.claims)
    }
}
