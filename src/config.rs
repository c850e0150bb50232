use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::fs;

/// Environment variable overriding `postgres_url`
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
/// Environment variable overriding `token_symmetric_key`
pub const TOKEN_KEY_ENV: &str = "TOKEN_SYMMETRIC_KEY";

/// Minimum HS256 secret length accepted by the token maker
pub const MIN_SECRET_KEY_SIZE: usize = 32;

/// Upper bound for token lifetimes (one year)
pub const MAX_TOKEN_DURATION_SECS: i64 = 366 * 24 * 60 * 60;

/// Log file rotation period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_environment")]
    pub environment: String,
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: LogRotation,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL; `DATABASE_URL` wins when set
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// HS256 secret, at least 32 characters; `TOKEN_SYMMETRIC_KEY` wins when set
    #[serde(default)]
    pub token_symmetric_key: String,
    #[serde(default = "default_access_token_duration")]
    pub access_token_duration_secs: i64,
    #[serde(default = "default_refresh_token_duration")]
    pub refresh_token_duration_secs: i64,
    /// Endpoint the verification link in sign-up emails points at
    #[serde(default = "default_verify_email_url")]
    pub verify_email_url: String,
    /// Cancel transfers still uncommitted after this many milliseconds
    #[serde(default)]
    pub transfer_timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_access_token_duration() -> i64 {
    15 * 60
}

fn default_refresh_token_duration() -> i64 {
    24 * 60 * 60
}

fn default_verify_email_url() -> String {
    "http://localhost:8080/api/v1/verify_email".to_string()
}

fn token_duration(name: &str, secs: i64) -> anyhow::Result<chrono::Duration> {
    if secs <= 0 || secs > MAX_TOKEN_DURATION_SECS {
        bail!(
            "{} must be between 1 and {} seconds",
            name,
            MAX_TOKEN_DURATION_SECS
        );
    }
    chrono::Duration::try_seconds(secs).with_context(|| format!("{} is out of range", name))
}

impl AppConfig {
    /// Load `config/{env}.yaml`, apply environment overrides, validate.
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config yaml")
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            self.postgres_url = Some(url);
        }
        if let Ok(key) = std::env::var(TOKEN_KEY_ENV) {
            self.token_symmetric_key = key;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.token_symmetric_key.len() < MIN_SECRET_KEY_SIZE {
            bail!(
                "token_symmetric_key must be at least {} characters",
                MIN_SECRET_KEY_SIZE
            );
        }
        let access = self.access_token_duration()?;
        let refresh = self.refresh_token_duration()?;
        if refresh < access {
            bail!("refresh_token_duration_secs must not be shorter than the access token's");
        }
        if self.max_connections == 0 {
            bail!("max_connections must be positive");
        }
        Ok(())
    }

    pub fn access_token_duration(&self) -> anyhow::Result<chrono::Duration> {
        token_duration("access_token_duration_secs", self.access_token_duration_secs)
    }

    pub fn refresh_token_duration(&self) -> anyhow::Result<chrono::Duration> {
        token_duration("refresh_token_duration_secs", self.refresh_token_duration_secs)
    }

    /// Connection URL, required to start the server
    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.postgres_url
            .as_deref()
            .with_context(|| {
                format!("postgres_url is not configured (or set {})", DATABASE_URL_ENV)
            })
    }
}
