//! Installs the process's single `tracing` subscriber. Library code never does this itself —
//! only the binary entry point calls [`init`].

use tracing_subscriber::EnvFilter;

/// Installs a `tracing-subscriber` formatter scoped by `filter_directive` (e.g. `"info"`,
/// `"conduit=debug,tower_http=warn"`). Panics if a subscriber is already installed, since that
/// indicates a programming error (two call sites racing to set the process-global subscriber).
pub fn init(filter_directive: &str) {
    let filter = EnvFilter::try_new(filter_directive).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
