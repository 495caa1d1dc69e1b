//! Tracing subscriber bootstrap.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Respects `RUST_LOG`; defaults to `info` for this crate. Safe to call
/// more than once — later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chaintrace=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
