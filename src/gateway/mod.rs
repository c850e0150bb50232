//! HTTP Gateway
//!
//! ```text
//! /api/v1/health              GET    public
//! /api/v1/users               POST   public
//! /api/v1/users/login         POST   public
//! /api/v1/verify_email        GET    public  ?email_id=&secret_code=
//! /api/v1/tokens/renew        POST   public
//! /api/v1/accounts            POST   bearer
//! /api/v1/accounts            GET    bearer  ?page_id=&page_size=
//! /api/v1/accounts/{id}       GET    bearer
//! /api/v1/transfers           POST   bearer
//! /api/v1/transfers/{id}      GET    bearer
//! /api/v1/entries/{id}        GET    bearer
//! ```

pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod state;
pub mod types;

use anyhow::Context;
use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::GatewayConfig;
use state::AppState;

/// Build the complete router
pub fn router(state: Arc<AppState>) -> Router {
    // ==========================================================================
    // Public Routes (no auth required)
    // ==========================================================================
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/users", post(handlers::create_user))
        .route("/users/login", post(handlers::login_user))
        .route("/verify_email", get(handlers::verify_email))
        .route("/tokens/renew", post(handlers::renew_access_token));

    // ==========================================================================
    // Private Routes (bearer token required)
    // ==========================================================================
    let private_routes = Router::new()
        .route(
            "/accounts",
            post(handlers::create_account).get(handlers::list_accounts),
        )
        .route("/accounts/{id}", get(handlers::get_account))
        .route("/transfers", post(handlers::create_transfer))
        .route("/transfers/{id}", get(handlers::get_transfer))
        .route("/entries/{id}", get(handlers::get_entry))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::bearer_auth_middleware,
        ));

    Router::new()
        .nest("/api/v1", public_routes.merge(private_routes))
        .with_state(state)
        // OpenAPI / Swagger UI (stateless, added after with_state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .layer(from_fn(middleware::request_log_middleware))
}

/// Start HTTP Gateway server; returns after Ctrl-C
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {} (port may already be in use)", addr))?;

    tracing::info!("Gateway listening on http://{}", addr);
    tracing::info!("API Docs: http://{}/docs", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use tower::ServiceExt;

    use crate::ledger::{
        Account, CreateAccountParams, CreateUserParams, LedgerStore, MemoryLedgerStore,
    };
    use crate::mail::{EmailSender, MailError, VerifyEmailMessage};
    use crate::token::{JwtMaker, Maker};
    use state::TokenDurations;
    use types::error_codes;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    /// Keeps every message instead of delivering it
    #[derive(Default)]
    struct RecordingEmailSender {
        sent: Mutex<Vec<VerifyEmailMessage>>,
    }

    #[async_trait::async_trait]
    impl EmailSender for RecordingEmailSender {
        async fn send_verify_email(&self, message: &VerifyEmailMessage) -> Result<(), MailError> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    struct FailingEmailSender;

    #[async_trait::async_trait]
    impl EmailSender for FailingEmailSender {
        async fn send_verify_email(&self, _: &VerifyEmailMessage) -> Result<(), MailError> {
            Err(MailError::Delivery("smtp unreachable".to_string()))
        }
    }

    struct TestApp {
        app: Router,
        state: Arc<AppState>,
        store: MemoryLedgerStore,
        mail: Arc<RecordingEmailSender>,
    }

    impl TestApp {
        fn new() -> Self {
            let mail = Arc::new(RecordingEmailSender::default());
            Self::with_sender(mail.clone(), mail)
        }

        fn with_sender(sender: Arc<dyn EmailSender>, mail: Arc<RecordingEmailSender>) -> Self {
            let store = MemoryLedgerStore::new();
            let state = Arc::new(AppState::new(
                Arc::new(store.clone()),
                Arc::new(JwtMaker::new(SECRET).unwrap()),
                TokenDurations {
                    access: chrono::Duration::minutes(15),
                    refresh: chrono::Duration::hours(24),
                },
                sender,
                None,
            ));
            Self {
                app: router(state.clone()),
                state,
                store,
                mail,
            }
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, body)
        }

        async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
            let mut builder = Request::builder().method("GET").uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            self.send(builder.body(Body::empty()).unwrap()).await
        }

        async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
            let mut builder = Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json");
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            self.send(builder.body(Body::from(body.to_string())).unwrap())
                .await
        }

        /// User row plus a valid access token, bypassing password hashing
        async fn user(&self, username: &str) -> String {
            self.store
                .create_user(CreateUserParams {
                    username: username.to_string(),
                    hashed_password: "unused".to_string(),
                    full_name: "Test User".to_string(),
                    email: format!("{}@example.com", username),
                })
                .await
                .unwrap();
            let (token, _) = self
                .state
                .token_maker
                .create_token(username, chrono::Duration::minutes(5))
                .unwrap();
            token
        }

        async fn account(&self, owner: &str, balance: i64, currency: &str) -> Account {
            self.store
                .create_account(CreateAccountParams {
                    owner: owner.to_string(),
                    balance,
                    currency: currency.to_string(),
                })
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_health() {
        let t = TestApp::new();
        let (status, body) = t.get("/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 0);
        assert!(body["data"]["timestamp_ms"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_openapi_served() {
        let t = TestApp::new();
        let (status, body) = t.get("/api-docs/openapi.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["info"]["title"], "Simple Bank API");
    }

    #[tokio::test]
    async fn test_register_login_and_accounts() {
        let t = TestApp::new();
        let user = json!({
            "username": "alice",
            "password": "secret123",
            "full_name": "Alice Smith",
            "email": "alice@example.com"
        });

        let (status, body) = t.post("/api/v1/users", None, user.clone()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["username"], "alice");
        assert!(body["data"].get("hashed_password").is_none());

        let (status, body) = t.post("/api/v1/users", None, user).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], error_codes::ALREADY_EXISTS);

        let (status, _) = t
            .post(
                "/api/v1/users/login",
                None,
                json!({"username": "alice", "password": "wrong-password"}),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = t
            .post(
                "/api/v1/users/login",
                None,
                json!({"username": "nobody", "password": "secret123"}),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = t
            .post(
                "/api/v1/users/login",
                None,
                json!({"username": "alice", "password": "secret123"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["data"]["access_token"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["user"]["email"], "alice@example.com");

        let (status, body) = t
            .post("/api/v1/accounts", Some(&token), json!({"currency": "USD"}))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["owner"], "alice");
        assert_eq!(body["data"]["balance"], 0);

        let (status, _) = t
            .post("/api/v1/accounts", Some(&token), json!({"currency": "USD"}))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = t
            .post("/api/v1/accounts", Some(&token), json!({"currency": "XYZ"}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = t
            .get("/api/v1/accounts?page_id=1&page_size=5", Some(&token))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, _) = t
            .get("/api/v1/accounts?page_id=1&page_size=20", Some(&token))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    async fn register_and_login(t: &TestApp) -> Value {
        let (status, _) = t
            .post(
                "/api/v1/users",
                None,
                json!({
                    "username": "alice",
                    "password": "secret123",
                    "full_name": "Alice Smith",
                    "email": "alice@example.com"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/users/login")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::USER_AGENT, "integration-test")
            .header("x-forwarded-for", "198.51.100.4")
            .body(Body::from(
                json!({"username": "alice", "password": "secret123"}).to_string(),
            ))
            .unwrap();
        let (status, body) = t.send(request).await;
        assert_eq!(status, StatusCode::OK);
        body["data"].clone()
    }

    #[tokio::test]
    async fn test_login_creates_session_and_renews() {
        let t = TestApp::new();
        let login = register_and_login(&t).await;

        let session_id: uuid::Uuid = login["session_id"].as_str().unwrap().parse().unwrap();
        let refresh_token = login["refresh_token"].as_str().unwrap().to_string();
        let session = t.store.get_session(session_id).await.unwrap();
        assert_eq!(session.username, "alice");
        assert_eq!(session.refresh_token, refresh_token);
        assert_eq!(session.user_agent, "integration-test");
        assert_eq!(session.client_ip, "198.51.100.4");
        assert!(!session.is_blocked);

        let (status, body) = t
            .post(
                "/api/v1/tokens/renew",
                None,
                json!({"refresh_token": refresh_token}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let renewed = body["data"]["access_token"].as_str().unwrap().to_string();
        let payload = t.state.token_maker.verify_token(&renewed).unwrap();
        assert_eq!(payload.username, "alice");

        let (status, _) = t
            .post("/api/v1/accounts", Some(&renewed), json!({"currency": "USD"}))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_renew_rejections() {
        let t = TestApp::new();
        let login = register_and_login(&t).await;

        let (status, body) = t
            .post("/api/v1/tokens/renew", None, json!({"refresh_token": "garbage"}))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], error_codes::AUTH_FAILED);

        let (status, _) = t
            .post("/api/v1/tokens/renew", None, json!({"refresh_token": ""}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // A valid token with no session behind it
        let access_token = login["access_token"].as_str().unwrap();
        let (status, body) = t
            .post(
                "/api/v1/tokens/renew",
                None,
                json!({"refresh_token": access_token}),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], error_codes::NOT_FOUND);

        let expired = t
            .state
            .token_maker
            .create_token("alice", -chrono::Duration::minutes(1))
            .unwrap()
            .0;
        let (status, _) = t
            .post("/api/v1/tokens/renew", None, json!({"refresh_token": expired}))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_renew_refuses_blocked_session() {
        let t = TestApp::new();
        t.user("alice").await;
        let (refresh_token, payload) = t
            .state
            .token_maker
            .create_token("alice", chrono::Duration::hours(1))
            .unwrap();
        t.store
            .create_session(crate::ledger::CreateSessionParams {
                id: payload.id,
                username: "alice".to_string(),
                refresh_token: refresh_token.clone(),
                user_agent: String::new(),
                client_ip: String::new(),
                is_blocked: true,
                expires_at: payload.expired_at,
            })
            .await
            .unwrap();

        let (status, body) = t
            .post(
                "/api/v1/tokens/renew",
                None,
                json!({"refresh_token": refresh_token}),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["msg"], "blocked session");
    }

    #[tokio::test]
    async fn test_verify_email_flow() {
        let t = TestApp::new();
        register_and_login(&t).await;

        let message = {
            let sent = t.mail.sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            sent[0].clone()
        };
        assert_eq!(message.to, "alice@example.com");
        assert_eq!(message.username, "alice");
        assert!(!t.store.get_user("alice").await.unwrap().is_email_verified);

        let uri = format!(
            "/api/v1/verify_email?email_id={}&secret_code={}",
            message.email_id, message.secret_code
        );
        let (status, body) = t.get(&uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["is_verified"], true);
        assert!(t.store.get_user("alice").await.unwrap().is_email_verified);

        // Codes are single use
        let (status, body) = t.get(&uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], error_codes::INVALID_PARAMETER);

        let wrong_code = format!(
            "/api/v1/verify_email?email_id={}&secret_code={}",
            message.email_id,
            "x".repeat(32)
        );
        assert_eq!(t.get(&wrong_code, None).await.0, StatusCode::BAD_REQUEST);

        let (status, _) = t
            .get("/api/v1/verify_email?email_id=0&secret_code=short", None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = t.get("/api/v1/verify_email", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_registration_survives_mail_failure() {
        let t = TestApp::with_sender(
            Arc::new(FailingEmailSender),
            Arc::new(RecordingEmailSender::default()),
        );
        let (status, body) = t
            .post(
                "/api/v1/users",
                None,
                json!({
                    "username": "bob",
                    "password": "secret123",
                    "full_name": "Bob Jones",
                    "email": "bob@example.com"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["is_email_verified"], false);
        assert!(t.store.get_user("bob").await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_user_input_rejected() {
        let t = TestApp::new();
        let (status, body) = t
            .post(
                "/api/v1/users",
                None,
                json!({
                    "username": "Bad Name",
                    "password": "123",
                    "full_name": "Bob",
                    "email": "not-an-email"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], error_codes::INVALID_PARAMETER);
    }

    #[tokio::test]
    async fn test_private_routes_require_token() {
        let t = TestApp::new();

        let (status, body) = t.get("/api/v1/accounts/1", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], error_codes::MISSING_AUTH);

        let (status, _) = t.get("/api/v1/accounts/1", Some("garbage")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let expired = {
            let maker = JwtMaker::new(SECRET).unwrap();
            maker
                .create_token("alice", -chrono::Duration::minutes(1))
                .unwrap()
                .0
        };
        let (status, body) = t.get("/api/v1/accounts/1", Some(&expired)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], error_codes::TOKEN_EXPIRED);
    }

    #[tokio::test]
    async fn test_get_account_ownership() {
        let t = TestApp::new();
        let alice = t.user("alice").await;
        let bob = t.user("bob").await;
        let account = t.account("alice", 100, "USD").await;

        let uri = format!("/api/v1/accounts/{}", account.id);
        let (status, body) = t.get(&uri, Some(&alice)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["balance"], 100);

        let (status, body) = t.get(&uri, Some(&bob)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], error_codes::FORBIDDEN);

        let (status, _) = t.get("/api/v1/accounts/9999", Some(&alice)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = t.get("/api/v1/accounts/0", Some(&alice)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_transfer_and_reads() {
        let t = TestApp::new();
        let alice = t.user("alice").await;
        let bob = t.user("bob").await;
        let carol = t.user("carol").await;
        let a = t.account("alice", 100, "USD").await;
        let b = t.account("bob", 50, "USD").await;

        let (status, body) = t
            .post(
                "/api/v1/transfers",
                Some(&alice),
                json!({
                    "from_account_id": a.id,
                    "to_account_id": b.id,
                    "amount": 30,
                    "currency": "USD"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["from_account"]["balance"], 70);
        assert_eq!(data["to_account"]["balance"], 80);
        assert_eq!(data["from_entry"]["amount"], -30);
        assert_eq!(data["to_entry"]["amount"], 30);

        let transfer_uri = format!("/api/v1/transfers/{}", data["transfer"]["id"]);
        assert_eq!(t.get(&transfer_uri, Some(&alice)).await.0, StatusCode::OK);
        assert_eq!(t.get(&transfer_uri, Some(&bob)).await.0, StatusCode::OK);
        assert_eq!(t.get(&transfer_uri, Some(&carol)).await.0, StatusCode::FORBIDDEN);

        let entry_uri = format!("/api/v1/entries/{}", data["from_entry"]["id"]);
        let (status, body) = t.get(&entry_uri, Some(&alice)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["account_id"], a.id);
        assert_eq!(t.get(&entry_uri, Some(&bob)).await.0, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_transfer_rejections_leave_balances() {
        let t = TestApp::new();
        let alice = t.user("alice").await;
        let bob = t.user("bob").await;
        let a = t.account("alice", 100, "USD").await;
        let a_eur = t.account("alice", 100, "EUR").await;
        let b = t.account("bob", 50, "USD").await;

        let transfer = |from: i64, to: i64, amount: i64, currency: &str| {
            json!({
                "from_account_id": from,
                "to_account_id": to,
                "amount": amount,
                "currency": currency
            })
        };

        // Source owned by someone else
        let (status, _) = t
            .post("/api/v1/transfers", Some(&bob), transfer(a.id, b.id, 10, "USD"))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Currency mismatch on either side
        let (status, body) = t
            .post("/api/v1/transfers", Some(&alice), transfer(a_eur.id, b.id, 10, "USD"))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], error_codes::CURRENCY_MISMATCH);
        let (status, _) = t
            .post("/api/v1/transfers", Some(&alice), transfer(a_eur.id, b.id, 10, "EUR"))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Shape checks
        let (status, _) = t
            .post("/api/v1/transfers", Some(&alice), transfer(a.id, b.id, 0, "USD"))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = t
            .post("/api/v1/transfers", Some(&alice), transfer(a.id, a.id, 10, "USD"))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Unknown destination
        let (status, _) = t
            .post("/api/v1/transfers", Some(&alice), transfer(a.id, 9999, 10, "USD"))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        assert_eq!(t.store.get_account(a.id).await.unwrap().balance, 100);
        assert_eq!(t.store.get_account(b.id).await.unwrap().balance, 50);
        assert_eq!(t.store.transfer_count(), 0);
        assert_eq!(t.store.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_is_500() {
        let t = TestApp::new();
        let alice = t.user("alice").await;
        t.user("carol").await;
        let a = t.account("alice", 100, "USD").await;
        let c = t.account("carol", 0, "USD").await;
        t.store.fail_balance_update_for(c.id);

        let (status, body) = t
            .post(
                "/api/v1/transfers",
                Some(&alice),
                json!({
                    "from_account_id": a.id,
                    "to_account_id": c.id,
                    "amount": 10,
                    "currency": "USD"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], error_codes::INTERNAL_ERROR);
        assert_eq!(body["msg"], "Internal error");
        assert_eq!(t.store.get_account(a.id).await.unwrap().balance, 100);
        assert_eq!(t.store.transfer_count(), 0);
    }
}
