//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::gateway::handlers::{
    HealthResponse, LoginUserResponse, RenewAccessTokenResponse, UserResponse, VerifyEmailResponse,
};
use crate::gateway::types::{
    CreateAccountRequest, CreateTransferRequest, CreateUserRequest, LoginUserRequest,
    RenewAccessTokenRequest,
};
use crate::ledger::{Account, Entry, Transfer, TransferTxResult};

/// Bearer access token issued by `/api/v1/users/login`
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("JWT")
                .build();
            components.add_security_scheme("bearer_auth", SecurityScheme::Http(scheme));
        }
    }
}

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Simple Bank API",
        version = "1.0.0",
        description = "Accounts, ledger entries and atomic funds transfers.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health::health_check,
        crate::gateway::handlers::user::create_user,
        crate::gateway::handlers::user::login_user,
        crate::gateway::handlers::user::verify_email,
        crate::gateway::handlers::token::renew_access_token,
        crate::gateway::handlers::account::create_account,
        crate::gateway::handlers::account::get_account,
        crate::gateway::handlers::account::list_accounts,
        crate::gateway::handlers::transfer::create_transfer,
        crate::gateway::handlers::transfer::get_transfer,
        crate::gateway::handlers::entry::get_entry,
    ),
    components(
        schemas(
            HealthResponse,
            UserResponse,
            LoginUserResponse,
            VerifyEmailResponse,
            RenewAccessTokenResponse,
            CreateUserRequest,
            LoginUserRequest,
            RenewAccessTokenRequest,
            CreateAccountRequest,
            CreateTransferRequest,
            Account,
            Entry,
            Transfer,
            TransferTxResult,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Users", description = "Registration, login and email verification"),
        (name = "Tokens", description = "Access token renewal"),
        (name = "Accounts", description = "Account management (auth required)"),
        (name = "Transfers", description = "Funds transfers and ledger entries (auth required)"),
        (name = "System", description = "Health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi;

    #[test]
    fn test_openapi_spec_generates() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Simple Bank API");
        assert_eq!(spec.info.version, "1.0.0");
        assert!(spec.to_json().is_ok());
    }

    #[test]
    fn test_endpoints_registered() {
        let paths = ApiDoc::openapi().paths;
        for path in [
            "/api/v1/health",
            "/api/v1/users",
            "/api/v1/users/login",
            "/api/v1/verify_email",
            "/api/v1/tokens/renew",
            "/api/v1/accounts",
            "/api/v1/accounts/{id}",
            "/api/v1/transfers",
            "/api/v1/transfers/{id}",
            "/api/v1/entries/{id}",
        ] {
            assert!(paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_security_scheme_registered() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("should have components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
