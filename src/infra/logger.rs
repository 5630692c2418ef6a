// src/infra/logger.rs — Structured logging with tracing

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber for optimization runs. The `SHOAL_LOG`
/// environment variable overrides `default_directive` (e.g.
/// `SHOAL_LOG=shoal=trace`). Later calls keep the first subscriber, so
/// test binaries can call this from every test.
pub fn init_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_env("SHOAL_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}
