//! Tracing initialization, adapted from the composition root's logging
//! setup: an `EnvFilter` seeded from configuration, with the output layer
//! chosen by format.

use crate::config::LoggingConfig;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub fn init(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "hodei_authz_runtime={},session={},store={},engine={},kernel={}",
            config.level, config.level, config.level, config.level, config.level
        ))
    });

    match config.format.as_str() {
        "json" => {
            tracing_subscriber::registry().with(env_filter).with(fmt::layer().json()).init();
        }
        "compact" => {
            tracing_subscriber::registry().with(env_filter).with(fmt::layer().compact()).init();
        }
        _ => {
            tracing_subscriber::registry().with(env_filter).with(fmt::layer().pretty()).init();
        }
    }
}
