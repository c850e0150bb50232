//! Gateway middleware
//!
//! - `bearer_auth_middleware`: verifies `Authorization: Bearer <token>` and
//!   injects the verified [`Payload`] as a request extension
//! - `request_log_middleware`: one structured log line per request

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};

use super::state::AppState;
use super::types::ApiError;
use crate::token::Payload;

const AUTHORIZATION_BEARER: &str = "bearer";

/// Parse the header value and verify the token.
pub fn authorize(state: &AppState, auth_header: Option<&str>) -> Result<Payload, ApiError> {
    let auth_header =
        auth_header.ok_or_else(|| ApiError::missing_auth("authorization header is missing"))?;

    let fields: Vec<&str> = auth_header.split_whitespace().collect();
    if fields.len() < 2 {
        return Err(ApiError::unauthorized(
            "unsupported authorization header format",
        ));
    }

    let auth_type = fields[0].to_lowercase();
    if auth_type != AUTHORIZATION_BEARER {
        return Err(ApiError::unauthorized(format!(
            "unsupported authorization type: {}",
            auth_type
        )));
    }

    Ok(state.token_maker.verify_token(fields[1])?)
}

pub async fn bearer_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let payload = authorize(&state, auth_header)?;
    request.extensions_mut().insert(payload);
    Ok(next.run(request).await)
}

pub async fn request_log_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;

    let status = response.status();
    let duration = format!("{:?}", start.elapsed());
    let status_text = status.canonical_reason().unwrap_or("");

    if status.is_success() {
        tracing::info!(
            protocol = "http",
            method = %method,
            path = %path,
            status_code = status.as_u16(),
            status_text,
            duration = %duration,
            "Received request"
        );
    } else {
        tracing::error!(
            protocol = "http",
            method = %method,
            path = %path,
            status_code = status.as_u16(),
            status_text,
            duration = %duration,
            "Received request"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::state::TokenDurations;
    use crate::ledger::MemoryLedgerStore;
    use crate::mail::LogEmailSender;
    use crate::token::{JwtMaker, Maker};
    use axum::http::StatusCode;

    fn state() -> AppState {
        AppState::new(
            Arc::new(MemoryLedgerStore::new()),
            Arc::new(JwtMaker::new("0123456789abcdef0123456789abcdef").unwrap()),
            TokenDurations {
                access: chrono::Duration::minutes(15),
                refresh: chrono::Duration::hours(24),
            },
            Arc::new(LogEmailSender::new("http://localhost/verify")),
            None,
        )
    }

    #[test]
    fn test_authorize_accepts_bearer_any_case() {
        let state = state();
        let (token, _) = state
            .token_maker
            .create_token("alice", chrono::Duration::minutes(1))
            .unwrap();

        let payload = authorize(&state, Some(&format!("Bearer {}", token))).unwrap();
        assert_eq!(payload.username, "alice");
        assert!(authorize(&state, Some(&format!("bearer {}", token))).is_ok());
    }

    #[test]
    fn test_authorize_rejections() {
        let state = state();

        let missing = authorize(&state, None).unwrap_err();
        assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

        let one_field = authorize(&state, Some("Bearer")).unwrap_err();
        assert_eq!(one_field.msg, "unsupported authorization header format");

        let basic = authorize(&state, Some("Basic dXNlcjpwYXNz")).unwrap_err();
        assert_eq!(basic.msg, "unsupported authorization type: basic");

        let garbage = authorize(&state, Some("Bearer not.a.token")).unwrap_err();
        assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
    }
}
