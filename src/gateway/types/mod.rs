//! Gateway types module
//!
//! ## Input Types
//! - Request DTOs validated with `validator`
//! - [`ValidatedJson`] / [`ValidatedQuery`]: Axum extractors for framework-level validation
//! - [`ClientMetadata`]: user agent and client IP of the caller
//!
//! ## Output Types
//! - [`ApiResponse<T>`]: Unified API response wrapper
//! - [`ApiError`]: Error half of [`ApiResult<T>`]
//!
//! ## Submodules
//! - [`request`]: Request types and extractors
//! - [`response`]: Response types and error codes

pub mod request;
pub mod response;

// Re-export commonly used types at module root
pub use request::{
    ClientMetadata, CreateAccountRequest, CreateTransferRequest, CreateUserRequest,
    ListAccountsQuery, LoginUserRequest, RenewAccessTokenRequest, ValidatedJson, ValidatedQuery,
    VerifyEmailQuery, require_id,
};
pub use response::{ApiError, ApiResponse, ApiResult, error_codes, ok};
