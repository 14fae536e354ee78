//! Structured logging setup.

use tracing_subscriber::EnvFilter;

/// Install the default env-filtered subscriber unless the embedding
/// application already set one. Safe to call from every entry point;
/// repeated calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("htmlpress=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
