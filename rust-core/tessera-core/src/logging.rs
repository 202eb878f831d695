//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to the
//! `tessera_core` target. Safe to call more than once: only the first call
//! installs a subscriber.

use crate::config::LogConfig;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// Returns `false` if a subscriber was already installed.
pub fn init_tracing(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}

fn default_directive(level: &str) -> String {
    format!("tessera_core={}", level.trim())
}
