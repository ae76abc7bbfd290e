// src/scanner/client.rs
// =============================================================================
// The probe client: one HTTP GET per candidate URL.
//
// Key functionality:
// - A single shared reqwest Client (connection pool, per-request timeout)
// - TLS certificate checks disabled, since targets are untrusted anyway
// - Redirects are NOT followed: a 301/302 comes back as-is, with Location
// - The body is only read when soft-404 filtering compares bodies, and then
//   only its first MAX_BODY_BYTES. Otherwise the response is dropped as soon
//   as the headers are in, so a huge or slow file is still a hit.
// - Optional retries on transient failures with a linear backoff
//
// The Prober trait is the seam between the engine and the network. The
// scanner only ever talks to `dyn Prober`, so tests can swap in a stub.
//
// Rust concepts:
// - async-trait: async fn inside a trait, usable as a trait object
// - Arc<dyn Trait>: shared ownership of a value behind a trait
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, LOCATION};
use reqwest::{redirect, Client, Response};
use tracing::debug;

use super::config::ScanConfig;
use super::error::ProbeError;

/// Identifying user agent sent with every probe.
pub const USER_AGENT: &str = concat!("dirprobe/", env!("CARGO_PKG_VERSION"));

/// Backoff unit: retry `n` waits `n * RETRY_STEP`.
pub const RETRY_STEP: Duration = Duration::from_secs(1);

/// Most body bytes kept for soft-404 comparison.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// What came back from a completed probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    /// Declared Content-Length, if the server sent one
    pub content_length: Option<u64>,
    /// Location header of a redirect
    pub location: Option<String>,
    /// Start of the body, empty unless soft-404 filtering needs it
    pub body: Vec<u8>,
}

impl ProbeResponse {
    #[cfg(test)]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            content_length: None,
            location: None,
            body: Vec::new(),
        }
    }

    /// Content length as reported in results: -1 when unknown.
    pub fn size(&self) -> i64 {
        self.content_length
            .and_then(|len| i64::try_from(len).ok())
            .unwrap_or(-1)
    }
}

/// Anything that can turn a URL into a probe response.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str) -> Result<ProbeResponse, ProbeError>;
}

/// The real network prober.
#[derive(Debug, Clone)]
pub struct ProbeClient {
    client: Client,
    read_body: bool,
}

impl ProbeClient {
    pub fn new(config: &ScanConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(500)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .danger_accept_invalid_certs(true)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            read_body: config.smart_filter,
        })
    }
}

#[async_trait]
impl Prober for ProbeClient {
    async fn probe(&self, url: &str) -> Result<ProbeResponse, ProbeError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "*/*")
            .send()
            .await
            .map_err(|e| ProbeError::from_reqwest(url, e))?;

        let status = response.status().as_u16();
        let content_length = response.content_length();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = if self.read_body {
            read_capped(url, response, MAX_BODY_BYTES).await
        } else {
            // Status and headers are all a hit needs
            drop(response);
            Vec::new()
        };

        Ok(ProbeResponse {
            status,
            content_length,
            location,
            body,
        })
    }
}

// Reads at most `limit` body bytes. The probe already has its status, so a
// body that breaks off or times out just leaves a shorter prefix.
async fn read_capped(url: &str, mut response: Response, limit: usize) -> Vec<u8> {
    let mut body = Vec::new();

    while body.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(limit - body.len());
                body.extend_from_slice(&chunk[..take]);
            }
            Ok(None) => break,
            Err(err) => {
                debug!(url, error = %err, read = body.len(), "body read cut short");
                break;
            }
        }
    }
    body
}

/// Probes `url`, retrying transient failures up to `max_retries` times.
///
/// Retry `n` (1-based) waits `n` seconds first, so `k` retries cost at least
/// `1 + 2 + ... + k` seconds. Permanent errors return immediately, and the
/// last error is returned once the budget is spent.
pub async fn probe_with_retry(
    prober: &dyn Prober,
    url: &str,
    max_retries: u32,
) -> Result<ProbeResponse, ProbeError> {
    let mut attempt = 0;

    loop {
        match prober.probe(url).await {
            Ok(response) => return Ok(response),
            Err(err) if err.is_transient() && attempt < max_retries => {
                attempt += 1;
                let delay = RETRY_STEP * attempt;
                debug!(url, attempt, max_retries, ?delay, error = %err, "transient failure, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
