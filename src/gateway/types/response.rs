//! API Response types and error codes
//!
//! - `ApiResponse<T>`: Unified response wrapper
//! - `ApiError` / `ApiResult<T>`: handler error path
//! - `error_codes`: Standard error code constants

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::ledger::LedgerError;
use crate::token::TokenError;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or null (error)
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response code: 0 for success, non-zero for errors
    #[schema(example = 0)]
    pub code: i32,
    /// Response message
    #[schema(example = "ok")]
    pub msg: String,
    /// Response data (only present when code == 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Create error response
    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

// ============================================================================
// Handler Errors
// ============================================================================

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

/// 200 OK with `data`
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

/// Error rendered as `(status, {code, msg})`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED, msg)
    }

    pub fn missing_auth(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error_codes::MISSING_AUTH, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, error_codes::FORBIDDEN, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error_codes::NOT_FOUND, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
            msg,
        )
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
            msg,
        )
    }

    pub fn into_err<T>(self) -> ApiResult<T> {
        Err(self)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiResponse::<()>::error(self.code, self.msg));
        (self.status, body).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = match &e {
            LedgerError::InvalidArgument(_) => error_codes::INVALID_PARAMETER,
            LedgerError::Unauthorized(_) => error_codes::AUTH_FAILED,
            LedgerError::Forbidden(_) => error_codes::FORBIDDEN,
            LedgerError::NotFound(_) => error_codes::NOT_FOUND,
            LedgerError::AlreadyExists(_) => error_codes::ALREADY_EXISTS,
            LedgerError::Canceled => error_codes::REQUEST_TIMEOUT,
            LedgerError::StorageFailure(_) => error_codes::INTERNAL_ERROR,
        };

        // Storage details stay in the log
        let msg = match &e {
            LedgerError::StorageFailure(detail) => {
                tracing::error!(error = %detail, "Storage failure");
                "Internal error".to_string()
            }
            other => other.to_string(),
        };

        Self::new(status, code, msg)
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::ExpiredToken => Self::new(
                StatusCode::UNAUTHORIZED,
                error_codes::TOKEN_EXPIRED,
                format!("invalid access token: {}", e),
            ),
            TokenError::InvalidToken => {
                Self::unauthorized(format!("invalid access token: {}", e))
            }
            TokenError::InvalidKeySize(_) | TokenError::Encoding(_) => {
                tracing::error!(error = %e, "Token maker failure");
                Self::internal("Token creation failed")
            }
        }
    }
}

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const CURRENCY_MISMATCH: i32 = 1002;

    // Auth errors (2xxx)
    pub const MISSING_AUTH: i32 = 2001;
    pub const AUTH_FAILED: i32 = 2002;
    pub const TOKEN_EXPIRED: i32 = 2003;
    pub const FORBIDDEN: i32 = 2004;

    // Resource errors (4xxx)
    pub const NOT_FOUND: i32 = 4001;
    pub const ALREADY_EXISTS: i32 = 4009;
    pub const REQUEST_TIMEOUT: i32 = 4080;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_mapping() {
        let e = ApiError::from(LedgerError::not_found("account", 7));
        assert_eq!(e.status, StatusCode::NOT_FOUND);
        assert_eq!(e.code, error_codes::NOT_FOUND);
        assert_eq!(e.msg, "Not found: account 7");

        let e = ApiError::from(LedgerError::Canceled);
        assert_eq!(e.status, StatusCode::REQUEST_TIMEOUT);

        let e = ApiError::from(LedgerError::AlreadyExists("user".into()));
        assert_eq!(e.status, StatusCode::CONFLICT);
        assert_eq!(e.code, error_codes::ALREADY_EXISTS);
    }

    #[test]
    fn test_storage_failure_hides_detail() {
        let e = ApiError::from(LedgerError::StorageFailure("connection reset".into()));
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.msg, "Internal error");
    }

    #[test]
    fn test_error_envelope_omits_data() {
        let body = serde_json::to_value(ApiResponse::<()>::error(1001, "bad")).unwrap();
        assert_eq!(body, serde_json::json!({"code": 1001, "msg": "bad"}));
    }
}
