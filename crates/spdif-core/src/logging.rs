//! Logging setup

use tracing_subscriber::EnvFilter;

use crate::config::DebugConfig;

/// Build the filter: `RUST_LOG` wins, then the configured directives,
/// then the configured level.
pub fn env_filter(debug: &DebugConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| match &debug.log_filter {
        Some(directives) => EnvFilter::try_new(directives)
            .unwrap_or_else(|_| EnvFilter::new(debug.log_level.as_directive())),
        None => EnvFilter::new(debug.log_level.as_directive()),
    })
}

/// Install the global fmt subscriber. Calling this twice is harmless.
pub fn init(debug: &DebugConfig) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(debug))
        .try_init();
}
