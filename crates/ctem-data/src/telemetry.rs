//! Tracing subscriber setup for hosts embedding the data layer

use crate::config::LogConfig;
use tracing_subscriber::EnvFilter;

/// Install a global `fmt` subscriber
///
/// Returns `false` when a subscriber is already installed, which leaves the
/// existing one in place.
pub fn init_tracing(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.is_ok()
}
