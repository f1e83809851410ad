//! Structured logging configuration
//!
//! Provides console logging with:
//! - JSON output for production (`format = "json"`)
//! - Pretty formatting for development
//! - `RUST_LOG` taking precedence over the configured level

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system based on configuration.
///
/// Calling this again after a subscriber is installed is a no-op.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    // Logs go to stderr so `snapshot` output on stdout stays clean
    let _ = match config.format.as_str() {
        "json" => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        "compact" => subscriber
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
        _ => subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(true)
                    .with_writer(std::io::stderr)
                    .pretty(),
            )
            .try_init(),
    };
}
