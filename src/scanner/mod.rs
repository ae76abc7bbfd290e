// src/scanner/mod.rs
// =============================================================================
// The scanning engine.
//
// Submodules:
// - config: ScanConfig and the parsers for comma-separated flags
// - client: the HTTP probe, the Prober trait, retry with linear backoff
// - rate: token-bucket rate limiter
// - filter: hit/miss classification and soft-404 calibration
// - engine: worker pool + orchestrator (scan, extensions, recursion)
// - result / stats: what a scan produces
// - error: error taxonomy
//
// Everything else in the crate talks to the engine through the re-exports
// below.
// =============================================================================

mod client;
mod config;
mod engine;
mod error;
mod filter;
mod rate;
mod result;
mod stats;

pub use config::{parse_extensions, parse_match_codes, ScanConfig};
pub use engine::Scanner;
pub use result::ProbeResult;
pub use stats::ScanStats;
