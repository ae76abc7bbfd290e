// src/logging.rs
// =============================================================================
// Sets up the tracing subscriber.
//
// Log lines go to stderr so stdout only carries the banner, hits and the
// results table. The filter comes from RUST_LOG, then DIRPROBE_LOG, then a
// default that depends on --verbose.
// =============================================================================

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const LOG_ENV: &str = "DIRPROBE_LOG";

pub fn initialize_logging(verbose: bool) -> Result<()> {
    let level = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var(LOG_ENV))
        .unwrap_or_else(|_| default_directive(verbose));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize logging: {}", e))
}

fn default_directive(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("{}={}", env!("CARGO_CRATE_NAME"), level)
}
