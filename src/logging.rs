//! Tracing bootstrap: rolling log file plus stdout in text mode.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::{AppConfig, LogRotation};

/// Crates that are too chatty at the application level
const QUIET_TARGETS: &[(&str, &str)] = &[("sqlx", "warn"), ("tower_http", "warn")];

/// `EnvFilter` directives for `level`. Explicit target directives in `level`
/// win over the quiet defaults.
pub fn filter_directives(level: &str) -> String {
    let mut directives = vec![level.to_string()];
    for (target, target_level) in QUIET_TARGETS {
        if !level.contains(&format!("{}=", target)) {
            directives.push(format!("{}={}", target, target_level));
        }
    }
    directives.join(",")
}

fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    }
}

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the process, or buffered file output is lost.
///
/// `RUST_LOG` wins over `log_level` when set.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let file_appender =
        RollingFileAppender::new(rotation(config.rotation), &config.log_dir, &config.log_file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(&config.log_level)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        let file_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false)
            .with_writer(non_blocking)
            .with_ansi(false);
        registry.with(file_layer).init();
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(non_blocking)
            .with_ansi(false);
        let stdout_layer = fmt::layer().with_target(false).with_ansi(true);
        registry.with(file_layer).with(stdout_layer).init();
    }

    tracing::debug!(
        environment = %config.environment,
        rotation = ?config.rotation,
        json = config.use_json,
        "Logging initialized"
    );
    guard
}
