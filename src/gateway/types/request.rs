//! Request DTOs and validating extractors
//!
//! - `ValidatedJson<T>` / `ValidatedQuery<T>`: deserialize, then run
//!   `validator::Validate`, so handlers never see malformed input.

use std::borrow::Cow;
use std::convert::Infallible;
use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::http::{HeaderName, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::response::ApiError;
use crate::currency::validate_currency;
use crate::validation;

fn rule(
    result: Result<(), validation::ValidationError>,
) -> Result<(), validator::ValidationError> {
    result.map_err(|e| {
        validator::ValidationError::new("invalid").with_message(Cow::Owned(e.to_string()))
    })
}

fn username_rule(value: &str) -> Result<(), validator::ValidationError> {
    rule(validation::validate_username(value))
}

fn full_name_rule(value: &str) -> Result<(), validator::ValidationError> {
    rule(validation::validate_full_name(value))
}

fn password_rule(value: &str) -> Result<(), validator::ValidationError> {
    rule(validation::validate_password(value))
}

fn email_rule(value: &str) -> Result<(), validator::ValidationError> {
    rule(validation::validate_email(value))
}

fn email_id_rule(value: i64) -> Result<(), validator::ValidationError> {
    rule(validation::validate_email_id(value))
}

fn secret_code_rule(value: &str) -> Result<(), validator::ValidationError> {
    rule(validation::validate_secret_code(value))
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[schema(example = "alice")]
    #[validate(custom(function = "username_rule"))]
    pub username: String,
    #[schema(example = "secret123")]
    #[validate(custom(function = "password_rule"))]
    pub password: String,
    #[schema(example = "Alice Smith")]
    #[validate(custom(function = "full_name_rule"))]
    pub full_name: String,
    #[schema(example = "alice@example.com")]
    #[validate(custom(function = "email_rule"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginUserRequest {
    #[schema(example = "alice")]
    #[validate(custom(function = "username_rule"))]
    pub username: String,
    #[schema(example = "secret123")]
    #[validate(custom(function = "password_rule"))]
    pub password: String,
}

/// Query string of the link sent in the verification email
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyEmailQuery {
    #[validate(custom(function = "email_id_rule"))]
    pub email_id: i64,
    #[validate(custom(function = "secret_code_rule"))]
    pub secret_code: String,
}

// ============================================================================
// Tokens
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RenewAccessTokenRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

// ============================================================================
// Accounts
// ============================================================================

/// The owner is always the authenticated user
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAccountRequest {
    #[schema(example = "USD")]
    #[validate(custom(function = "validate_currency"))]
    pub currency: String,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListAccountsQuery {
    /// 1-based page number
    #[validate(range(min = 1))]
    pub page_id: i32,
    #[validate(range(min = 5, max = 10))]
    pub page_size: i32,
}

// ============================================================================
// Transfers
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTransferRequest {
    #[schema(example = 1)]
    #[validate(range(min = 1))]
    pub from_account_id: i64,
    #[schema(example = 2)]
    #[validate(range(min = 1))]
    pub to_account_id: i64,
    #[schema(example = 30)]
    #[validate(range(min = 1))]
    pub amount: i64,
    /// Both accounts must hold this currency
    #[schema(example = "USD")]
    #[validate(custom(function = "validate_currency"))]
    pub currency: String,
}

// ============================================================================
// Extractors
// ============================================================================

/// JSON body that passed `Validate`
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e.body_text())))?;
        value
            .validate()
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        Ok(ValidatedJson(value))
    }
}

/// Query string that passed `Validate`
#[derive(Debug)]
pub struct ValidatedQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid query: {}", e.body_text())))?;
        value
            .validate()
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        Ok(ValidatedQuery(value))
    }
}

/// Caller details recorded on a login session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientMetadata {
    pub user_agent: String,
    pub client_ip: String,
}

impl<S> FromRequestParts<S> for ClientMetadata
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_value = |name: HeaderName| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let user_agent = header_value(header::USER_AGENT).unwrap_or_default();
        let forwarded = header_value(HeaderName::from_static("x-forwarded-for"))
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()));
        let client_ip = forwarded
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_default();

        Ok(ClientMetadata {
            user_agent,
            client_ip,
        })
    }
}

/// Path ids are row ids and must be >= 1
pub fn require_id(id: i64) -> Result<i64, ApiError> {
    if id < 1 {
        return Err(ApiError::bad_request("id must be a positive integer"));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_request_rules() {
        let valid = CreateTransferRequest {
            from_account_id: 1,
            to_account_id: 2,
            amount: 10,
            currency: "USD".to_string(),
        };
        assert!(valid.validate().is_ok());

        let zero_amount = CreateTransferRequest { amount: 0, ..valid };
        assert!(zero_amount.validate().is_err());

        let bad_currency = CreateTransferRequest {
            amount: 10,
            currency: "XYZ".to_string(),
            ..zero_amount
        };
        assert!(bad_currency.validate().is_err());
    }

    #[test]
    fn test_list_accounts_page_size_bounds() {
        let q = |page_id, page_size| ListAccountsQuery { page_id, page_size };
        assert!(q(1, 5).validate().is_ok());
        assert!(q(3, 10).validate().is_ok());
        assert!(q(0, 5).validate().is_err());
        assert!(q(1, 4).validate().is_err());
        assert!(q(1, 11).validate().is_err());
    }

    #[test]
    fn test_create_user_rules() {
        let req = CreateUserRequest {
            username: "alice_1".to_string(),
            password: "secret123".to_string(),
            full_name: "Alice Smith".to_string(),
            email: "alice@example.com".to_string(),
        };
        assert!(req.validate().is_ok());

        let bad = CreateUserRequest {
            username: "Alice!".to_string(),
            ..req
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_verify_email_query_rules() {
        let q = |email_id, secret_code: &str| VerifyEmailQuery {
            email_id,
            secret_code: secret_code.to_string(),
        };
        assert!(q(1, &"a".repeat(32)).validate().is_ok());
        assert!(q(0, &"a".repeat(32)).validate().is_err());
        assert!(q(1, "short").validate().is_err());
    }

    #[tokio::test]
    async fn test_client_metadata_prefers_forwarded_for() {
        let request = axum::http::Request::builder()
            .header(header::USER_AGENT, "curl/8.0")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))))
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let meta = ClientMetadata::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(meta.user_agent, "curl/8.0");
        assert_eq!(meta.client_ip, "203.0.113.7");
    }

    #[tokio::test]
    async fn test_client_metadata_falls_back_to_peer() {
        let request = axum::http::Request::builder()
            .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))))
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let meta = ClientMetadata::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(meta.user_agent, "");
        assert_eq!(meta.client_ip, "127.0.0.1");

        let (mut parts, _) = axum::http::Request::new(()).into_parts();
        let meta = ClientMetadata::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(meta, ClientMetadata::default());
    }

    #[test]
    fn test_require_id() {
        assert_eq!(require_id(1), Ok(1));
        assert!(require_id(0).is_err());
        assert!(require_id(-3).is_err());
    }
}
