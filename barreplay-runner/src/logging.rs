//! Tracing subscriber setup for binaries and tests.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a fmt subscriber filtered by `RUST_LOG`, or `default_filter` when
/// unset (e.g. `"barreplay_core=info,barreplay_runner=info"`).
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing(default_filter: &str) -> bool {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
