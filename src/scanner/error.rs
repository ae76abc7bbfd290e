// src/scanner/error.rs
// =============================================================================
// Error types for the scanning engine.
//
// Two families:
// - ProbeError: one failed HTTP probe. Handled inside the worker and folded
//   into the failure counter; never aborts a scan.
// - ScanError: anything that stops a Scanner from being built at all
//   (bad configuration, HTTP client construction failure).
//
// Rust concepts:
// - thiserror: derives std::error::Error and Display from attributes
// - Enums with named fields: each variant carries its own context
// =============================================================================

use std::io;

use thiserror::Error;

/// Why a single probe did not produce a response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    /// The URL could not be turned into a request.
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The request did not finish within the per-request timeout.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// The connection broke in a way that may succeed on another attempt
    /// (reset, aborted, broken pipe).
    #[error("connection to {url} interrupted: {reason}")]
    Connection { url: String, reason: String },

    /// Any other transport failure (refused, DNS, TLS, protocol).
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// Headers arrived but the body could not be drained.
    #[error("failed to read body from {url}: {reason}")]
    Body { url: String, reason: String },
}

impl ProbeError {
    /// Transient errors are worth retrying; everything else fails fast.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProbeError::Timeout { .. } | ProbeError::Connection { .. })
    }

    /// Maps a reqwest error onto the taxonomy above.
    pub fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        let url = url.to_string();

        if error.is_timeout() {
            return ProbeError::Timeout { url };
        }
        if error.is_builder() {
            return ProbeError::InvalidUrl { url, reason: error.to_string() };
        }
        if error.is_body() || error.is_decode() {
            return ProbeError::Body { url, reason: error.to_string() };
        }

        if hung_up_early(&error) {
            return ProbeError::Connection { url, reason: error.to_string() };
        }

        match io_error_kind(&error) {
            Some(kind) if is_transient_io(kind) => ProbeError::Connection {
                url,
                reason: error.to_string(),
            },
            Some(io::ErrorKind::TimedOut) => ProbeError::Timeout { url },
            _ => ProbeError::Request { url, reason: error.to_string() },
        }
    }
}

// Walks the source chain looking for an error of type T.
fn find_source<'a, T>(error: &'a (dyn std::error::Error + 'static)) -> Option<&'a T>
where
    T: std::error::Error + 'static,
{
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(found) = err.downcast_ref::<T>() {
            return Some(found);
        }
        current = err.source();
    }
    None
}

fn io_error_kind(error: &(dyn std::error::Error + 'static)) -> Option<io::ErrorKind> {
    find_source::<io::Error>(error).map(io::Error::kind)
}

// The server closed the connection before a full response arrived. hyper
// reports this without an io::Error underneath.
fn hung_up_early(error: &(dyn std::error::Error + 'static)) -> bool {
    find_source::<hyper::Error>(error).is_some_and(hyper::Error::is_incomplete_message)
}

fn is_transient_io(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::Interrupted
            | io::ErrorKind::UnexpectedEof
    )
}

/// Configuration rejected before any request is sent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid base url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("thread count must be at least 1")]
    NoThreads,

    #[error("timeout must be at least 1 second")]
    ZeroTimeout,

    #[error("at least one match status code is required")]
    NoMatchCodes,
}

/// Errors that prevent a Scanner from being created.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
