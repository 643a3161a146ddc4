//! Tracing subscriber setup

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Build the filter; `RUST_LOG` wins over the configured level
fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{level},hyper=warn,reqwest=warn",
            level = config.level
        ))
    })
}

/// Install the global subscriber. Call once from `main`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match config.format.as_str() {
        "json" => builder.json().try_init(),
        "compact" => builder.compact().try_init(),
        _ => builder.pretty().try_init(),
    };

    result.map_err(|e| anyhow!("Failed to initialize logging: {e}"))
}
