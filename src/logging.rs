//! Tracing setup for the harness binary
//!
//! Child runtime output is re-logged under the `runtime` target so it can
//! be filtered independently of the harness's own spans.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the tracing subscriber with an optional base level
/// (trace, debug, info, warn, error). Noisy HTTP internals stay at warn.
pub fn init_tracing_with_level(log_level: Option<&str>) {
    let base_level = log_level.unwrap_or("info");
    let level_filter =
        format!("node_harness={base_level},runtime={base_level},reqwest=warn,hyper=warn");

    fmt()
        .with_env_filter(EnvFilter::new(&level_filter))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Log service startup banner
pub fn log_startup(component: &str) {
    tracing::info!("🚀 Starting {component}");
}

/// Log shutdown reason
pub fn log_shutdown(reason: &str) {
    tracing::info!("🛑 Shutting down: {reason}");
}
