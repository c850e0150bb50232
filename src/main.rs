//! Simple Bank server
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────────┐    ┌──────────┐
//! │  Config  │───▶│ Gateway  │───▶│ Orchestrator │───▶│ Postgres │
//! │  (YAML)  │    │  (axum)  │    │  (transfer)  │    │ (ledger) │
//! └──────────┘    └──────────┘    └──────────────┘    └──────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;

use simple_bank::config::AppConfig;
use simple_bank::db::Database;
use simple_bank::gateway::{self, state::AppState};
use simple_bank::ledger::PgLedgerStore;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

fn skip_migrations() -> bool {
    std::env::args().any(|a| a == "--no-migrate")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut app_config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        app_config.gateway.port = port;
    }
    let _log_guard = simple_bank::logging::init_logging(&app_config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        "Starting Simple Bank in {} mode",
        app_config.environment
    );

    let db = Database::connect(app_config.database_url()?, app_config.max_connections)
        .await
        .context("Failed to connect to PostgreSQL")?;
    if !skip_migrations() {
        db.migrate().await.context("Failed to run migrations")?;
    }

    let store = Arc::new(PgLedgerStore::new(db.pool().clone()));
    let state = Arc::new(AppState::from_config(&app_config, store)?);

    gateway::run_server(&app_config.gateway, state).await
}
