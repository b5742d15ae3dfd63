//! Tracing subscriber setup for binaries and tests embedding the scheduler.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a stdout subscriber filtered by `level` (an `EnvFilter`
/// directive such as `"info"` or `"alefbet=debug"`).
///
/// Falls back to `info` on an unparsable directive. Returns `false` when a
/// global subscriber was already installed.
pub fn init_tracing(level: &str) -> bool {
    let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}
