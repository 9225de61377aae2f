//! Tracing subscriber setup shared by the service binaries

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber
///
/// The filter is read from `RUST_LOG`; when unset, `default_directive`
/// (for example `info`) is used. Calling this twice keeps the first
/// subscriber.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
