//! Tracing subscriber setup driven by the `logging` namespace

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Build the event filter: `RUST_LOG` when set, otherwise the configured level
pub fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(config: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(config))
        .with_target(config.target);

    let _ = match config.format {
        LogFormat::Json => builder
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
}
