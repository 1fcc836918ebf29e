use crate::config::{AppEnvironment, TelemetryConfig};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log level/filter '{value}': unable to build EnvFilter")]
    EnvFilter {
        value: String,
        #[source]
        source: ParseError,
    },
    #[error("telemetry error: {0}")]
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

/// Install the global subscriber. ANSI colours are only emitted in development.
pub fn init(config: &TelemetryConfig, environment: AppEnvironment) -> Result<(), TelemetryError> {
    let filter = directive_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok(), &config.log_level)?;

    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_ansi(matches!(environment, AppEnvironment::Development))
        .with_env_filter(filter)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

/// A usable `RUST_LOG` wins; otherwise the configured level must parse.
fn directive_filter(rust_log: Option<String>, fallback: &str) -> Result<EnvFilter, TelemetryError> {
    if let Some(filter) = rust_log.and_then(|directives| EnvFilter::try_new(directives).ok()) {
        return Ok(filter);
    }
    EnvFilter::try_new(fallback).map_err(|source| TelemetryError::EnvFilter {
        value: fallback.to_string(),
        source,
    })
}
