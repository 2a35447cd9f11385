//! Logging setup
//!
//! The library itself only emits `tracing` events; binaries and tests that
//! want them printed call [`init_tracing`] once at startup.

use crate::config::LogConfig;
use crate::error::{Error, Result};
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Map a textual level onto a tracing level, defaulting to info
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install a global subscriber.
///
/// `RUST_LOG` directives are honoured on top of the configured level. Fails
/// if a global subscriber is already installed.
pub fn init_tracing(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(parse_level(&config.level).into());

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init()
    };

    installed.map_err(|e| Error::Configuration(format!("failed to install tracing subscriber: {}", e)))
}
