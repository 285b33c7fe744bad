//! Structured logging setup.
//!
//! Installs a global `tracing` subscriber from a [`LoggingConfig`]. `RUST_LOG`
//! takes precedence over the configured level when it is set.

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};
use tracing_subscriber::EnvFilter;

/// Build the filter for a logging configuration.
///
/// Per-word exchange lines are logged at `trace`, so `log_exchanges` raises this
/// crate's level to `trace` without affecting dependencies.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let level = config.log_level.to_string().to_lowercase();
    let directive = if config.log_exchanges {
        format!("{level},multiboot_protocol=trace")
    } else {
        level
    };
    EnvFilter::new(directive)
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| ProtocolError::ConfigError(format!("Failed to install logger: {e}")))
}
