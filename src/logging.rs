//! Logging setup.
//!
//! Console output through `tracing-subscriber`, filtered by `RUST_LOG` when
//! set and by the configured [`LogLevel`] otherwise.

use crate::api::types::LogLevel;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter for `level`, overridden by `RUST_LOG` when present
pub fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()))
}

/// Install the global subscriber.
///
/// Returns `false` if a subscriber was already installed, so repeated calls
/// (e.g. from several tests) are harmless.
pub fn init_logging(level: LogLevel) -> bool {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(stderr_layer)
        .try_init()
        .is_ok()
}
