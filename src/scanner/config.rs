// src/scanner/config.rs
// =============================================================================
// Scan configuration.
//
// A ScanConfig is built once from the command line and never changes while
// a scan runs. The recursive scan does not touch it either: the base URL of
// each recursive branch is passed down as a parameter.
// =============================================================================

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use super::error::ConfigError;

/// Status codes reported when the user does not pass `--mc`.
pub const DEFAULT_MATCH_CODES: [u16; 5] = [200, 301, 302, 401, 403];

#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Target root, stored without a trailing slash
    pub base_url: String,
    /// Number of concurrent workers
    pub threads: usize,
    /// Per-request timeout
    pub timeout: Duration,
    /// Status codes that count as a hit
    pub match_codes: BTreeSet<u16>,
    pub verbose: bool,
    /// Requests per second across all workers (0 = unlimited)
    pub rate: u32,
    /// Retries after the first attempt, for transient errors only
    pub max_retries: u32,
    pub recursive: bool,
    pub max_depth: usize,
    /// Suffixes appended as `word.ext`
    pub extensions: Vec<String>,
    pub wordlist_path: PathBuf,
    /// Suppress responses that look like the calibrated soft-404 page
    pub smart_filter: bool,
}

impl ScanConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            threads: 50,
            timeout: Duration::from_secs(10),
            match_codes: DEFAULT_MATCH_CODES.into_iter().collect(),
            verbose: false,
            rate: 0,
            max_retries: 0,
            recursive: false,
            max_depth: 3,
            extensions: Vec::new(),
            wordlist_path: PathBuf::new(),
            smart_filter: false,
        }
    }

    /// Checks everything that would make a scan meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        if parsed.host_str().is_none() {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: "missing host".to_string(),
            });
        }
        if self.threads == 0 {
            return Err(ConfigError::NoThreads);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.match_codes.is_empty() {
            return Err(ConfigError::NoMatchCodes);
        }

        Ok(())
    }
}

/// Strips trailing slashes so that `base + "/" + word` never doubles them.
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Parses a comma-separated list of status codes.
///
/// Entries that are blank or not numbers are skipped. If nothing valid
/// remains, falls back to `{200}`.
pub fn parse_match_codes(codes: &str) -> BTreeSet<u16> {
    let parsed: BTreeSet<u16> = codes
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter_map(|p| p.parse::<u16>().ok())
        .collect();

    if parsed.is_empty() {
        BTreeSet::from([200])
    } else {
        parsed
    }
}

/// Parses a comma-separated list of extensions, dropping leading dots.
pub fn parse_extensions(exts: &str) -> Vec<String> {
    exts.split(',')
        .map(|p| p.trim().trim_start_matches('.'))
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
