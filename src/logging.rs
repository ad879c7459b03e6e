//! Tracing subscriber setup
//!
//! Embedders that already install a subscriber can skip this entirely; the
//! engine only emits `tracing` events.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;
use crate::error::{Result, VeerError};

/// Install a global subscriber for the given log configuration.
///
/// `RUST_LOG` takes precedence over `LogConfig::level` when set.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("veer={}", config.level).into());

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format.to_lowercase().as_str() {
        "pretty" | "text" => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        _ => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };

    result.map_err(|e| VeerError::Logging(e.to_string()))
}
