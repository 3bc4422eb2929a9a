//! Tracing setup (SPEC_FULL.md §8.1).
//!
//! Stdout-only: every component logs at module-scoped targets
//! (`aegis::swarm`, `aegis::mission`, `aegis::workspace`, ...) with
//! structured fields rather than interpolated strings.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::models::config::LogConfig;

/// Holds nothing live today, kept as a type so `init` can later return a
/// `WorkerGuard` without changing call sites if file output is added.
pub struct LoggerImpl;

impl LoggerImpl {
    /// Initializes the global tracing subscriber from `config`.
    ///
    /// # Errors
    /// Returns an error if `config.level` does not parse or the subscriber
    /// is already initialized.
    pub fn init(config: &LogConfig) -> Result<Self> {
        let default_level = parse_log_level(&config.level)?;
        let env_filter = EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy();

        match config.format.as_str() {
            "json" => {
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_filter(env_filter);
                tracing_subscriber::registry().with(layer).init();
            }
            _ => {
                let layer = tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_filter(env_filter);
                tracing_subscriber::registry().with(layer).init();
            }
        }

        tracing::info!(level = %config.level, format = %config.format, "logger initialized");
        Ok(Self)
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => anyhow::bail!("invalid log level: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels_case_insensitively() {
        assert!(matches!(parse_log_level("INFO"), Ok(Level::INFO)));
        assert!(matches!(parse_log_level("warn"), Ok(Level::WARN)));
        assert!(parse_log_level("verbose").is_err());
    }
}
