// src/scanner/result.rs
// =============================================================================
// A single reported hit.
//
// Created by a worker once a probe completed, matched the status filter and
// passed the soft-404 check. Never modified afterwards.
// =============================================================================

use std::time::Duration;

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub url: String,
    #[serde(rename = "status")]
    pub status_code: u16,
    /// Declared Content-Length, -1 when the server did not send one
    pub size: i64,
    /// Time from sending the request to the end of the body (retries included)
    #[serde(rename = "time", serialize_with = "as_nanos")]
    pub elapsed: Duration,
    /// Location header of a redirect hit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ProbeResult {
    pub fn is_redirect(&self) -> bool {
        matches!(self.status_code, 301 | 302)
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }
}

fn as_nanos<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
    serializer.serialize_u64(nanos)
}
