//! Structured logging setup.
//!
//! Installs a global `tracing` subscriber with an `EnvFilter` and either a
//! human-readable or JSON formatter. `RUST_LOG` overrides the configured
//! level when set.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};

/// Builds the filter: `RUST_LOG` first, then the configured directive.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Initializes the global subscriber.
///
/// Returns `false` when a subscriber was already installed, which happens
/// in tests and when embedding the library.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = env_filter(config);

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_filter(filter),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_filter(filter),
            )
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("global tracing subscriber already set, keeping it");
        return false;
    }

    tracing::info!(format = ?config.format, level = %config.level, "logging initialized");
    true
}
