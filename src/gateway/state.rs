use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::ledger::{LedgerStore, TransferOrchestrator};
use crate::mail::{EmailSender, LogEmailSender};
use crate::token::{JwtMaker, Maker};

/// Lifetimes of issued tokens
#[derive(Debug, Clone, Copy)]
pub struct TokenDurations {
    pub access: chrono::Duration,
    pub refresh: chrono::Duration,
}

/// Gateway application state (shared)
#[derive(Clone)]
pub struct AppState {
    /// Plain reads, user/account/session creation
    pub store: Arc<dyn LedgerStore>,
    /// The only path that moves money
    pub orchestrator: Arc<TransferOrchestrator>,
    pub token_maker: Arc<dyn Maker>,
    pub access_token_duration: chrono::Duration,
    pub refresh_token_duration: chrono::Duration,
    pub email_sender: Arc<dyn EmailSender>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        token_maker: Arc<dyn Maker>,
        durations: TokenDurations,
        email_sender: Arc<dyn EmailSender>,
        transfer_timeout: Option<Duration>,
    ) -> Self {
        let orchestrator = TransferOrchestrator::new(Arc::clone(&store));
        let orchestrator = match transfer_timeout {
            Some(limit) => orchestrator.with_timeout(limit),
            None => orchestrator,
        };

        Self {
            store,
            orchestrator: Arc::new(orchestrator),
            token_maker,
            access_token_duration: durations.access,
            refresh_token_duration: durations.refresh,
            email_sender,
        }
    }

    pub fn from_config(config: &AppConfig, store: Arc<dyn LedgerStore>) -> anyhow::Result<Self> {
        let token_maker = JwtMaker::new(&config.token_symmetric_key)?;
        let durations = TokenDurations {
            access: config.access_token_duration()?,
            refresh: config.refresh_token_duration()?,
        };
        Ok(Self::new(
            store,
            Arc::new(token_maker),
            durations,
            Arc::new(LogEmailSender::new(config.verify_email_url.clone())),
            config.transfer_timeout_ms.map(Duration::from_millis),
        ))
    }
}
