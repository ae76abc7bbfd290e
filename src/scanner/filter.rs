// src/scanner/filter.rs
// =============================================================================
// Response classification.
//
// Two questions per completed probe:
// - is_hit: is the status code in the configured match set?
// - is_genuine: does the response differ from the server's "not found"
//   page? Some servers answer every unknown path with 200 and an error page
//   (a "soft 404"). Calibration probes a random path once, remembers what
//   came back, and later responses that look identical are dropped. Error
//   pages often echo the path they were asked for, so each side is also
//   compared with its own requested word cut out.
//
// Soft-404 suppression is opt-in (--smart-filter). Without calibration data
// every response is genuine.
// =============================================================================

use std::collections::BTreeSet;
use std::sync::OnceLock;

use rand::Rng;

use super::client::ProbeResponse;

const CALIBRATION_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
pub const CALIBRATION_PATH_LEN: usize = 32;

/// Fingerprint of the server's response to a path that does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calibration {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: Vec<u8>,
    /// Body with the random path cut out
    unechoed: Vec<u8>,
}

impl Calibration {
    /// Builds the fingerprint from the answer to `path`.
    pub fn capture(response: ProbeResponse, path: &str) -> Self {
        let unechoed = strip_echo(&response.body, path);
        Self {
            status: response.status,
            content_length: response.content_length,
            body: response.body,
            unechoed,
        }
    }

    fn matches(&self, response: &ProbeResponse, requested: &str) -> bool {
        if response.status != self.status {
            return false;
        }
        if !self.body.is_empty() || !response.body.is_empty() {
            return response.body == self.body
                || strip_echo(&response.body, requested) == self.unechoed;
        }
        // Neither side had a body to compare, fall back to declared length
        self.content_length.is_some() && response.content_length == self.content_length
    }
}

// Removes every occurrence of `echo` from `body`.
fn strip_echo(body: &[u8], echo: &str) -> Vec<u8> {
    let needle = echo.as_bytes();
    if needle.is_empty() {
        return body.to_vec();
    }

    let mut out = Vec::with_capacity(body.len());
    let mut rest = body;
    while let Some(pos) = rest.windows(needle.len()).position(|w| w == needle) {
        out.extend_from_slice(&rest[..pos]);
        rest = &rest[pos + needle.len()..];
    }
    out.extend_from_slice(rest);
    out
}

#[derive(Debug)]
pub struct Classifier {
    match_codes: BTreeSet<u16>,
    smart_filter: bool,
    calibration: OnceLock<Calibration>,
}

impl Classifier {
    pub fn new(match_codes: BTreeSet<u16>, smart_filter: bool) -> Self {
        Self {
            match_codes,
            smart_filter,
            calibration: OnceLock::new(),
        }
    }

    pub fn is_hit(&self, status: u16) -> bool {
        self.match_codes.contains(&status)
    }

    /// `requested` is the word that was appended to the base URL.
    pub fn is_genuine(&self, response: &ProbeResponse, requested: &str) -> bool {
        match self.calibration.get() {
            Some(baseline) if self.smart_filter => !baseline.matches(response, requested),
            _ => true,
        }
    }

    /// Whether a calibration probe should be sent at all.
    pub fn wants_calibration(&self) -> bool {
        self.smart_filter && self.calibration.get().is_none()
    }

    /// Records the soft-404 fingerprint. Only the first call has an effect.
    pub fn calibrate(&self, baseline: Calibration) -> bool {
        self.calibration.set(baseline).is_ok()
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.get()
    }
}

/// A random lowercase alphanumeric path that should not exist on the target.
pub fn random_path(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..CALIBRATION_CHARSET.len());
            CALIBRATION_CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> ProbeResponse {
        ProbeResponse {
            status,
            content_length: Some(body.len() as u64),
            location: None,
            body: body.as_bytes().to_vec(),
        }
    }

    fn baseline(status: u16, body: &str) -> Calibration {
        Calibration::capture(response(status, body), "q7x2k9")
    }

    #[test]
    fn test_is_hit_is_set_membership() {
        let classifier = Classifier::new(BTreeSet::from([200, 403]), false);
        assert!(classifier.is_hit(200));
        assert!(classifier.is_hit(403));
        assert!(!classifier.is_hit(404));
        assert!(!classifier.is_hit(301));
    }

    #[test]
    fn test_everything_genuine_without_smart_filter() {
        let classifier = Classifier::new(BTreeSet::from([200]), false);
        classifier.calibrate(baseline(200, "Not here"));

        assert!(!classifier.wants_calibration());
        assert!(classifier.is_genuine(&response(200, "Not here"), "x"));
    }

    #[test]
    fn test_everything_genuine_before_calibration() {
        let classifier = Classifier::new(BTreeSet::from([200]), true);
        assert!(classifier.wants_calibration());
        assert!(classifier.is_genuine(&response(200, "anything"), "x"));
    }

    #[test]
    fn test_soft_404_suppressed() {
        let classifier = Classifier::new(BTreeSet::from([200]), true);
        assert!(classifier.calibrate(baseline(200, "Page not found")));

        assert!(!classifier.is_genuine(&response(200, "Page not found"), "old"));
        assert!(classifier.is_genuine(&response(200, "Welcome, admin"), "admin"));
        // Same body, different status is a different page
        assert!(classifier.is_genuine(&response(403, "Page not found"), "old"));
    }

    #[test]
    fn test_soft_404_echoing_the_path_suppressed() {
        let classifier = Classifier::new(BTreeSet::from([200]), true);
        classifier.calibrate(baseline(200, "<p>/q7x2k9 was not found</p>"));

        assert!(!classifier.is_genuine(&response(200, "<p>/backup was not found</p>"), "backup"));
        assert!(classifier.is_genuine(&response(200, "<p>backup index</p>"), "backup"));
    }

    #[test]
    fn test_strip_echo() {
        assert_eq!(strip_echo(b"/abc or abc", "abc"), b"/ or ");
        assert_eq!(strip_echo(b"nothing", "abc"), b"nothing");
        assert_eq!(strip_echo(b"keep", ""), b"keep");
    }

    #[test]
    fn test_empty_bodies_compare_by_length() {
        let classifier = Classifier::new(BTreeSet::from([200]), true);
        let mut empty = ProbeResponse::new(200);
        empty.content_length = Some(0);
        classifier.calibrate(Calibration::capture(empty.clone(), "q7x2k9"));

        assert!(!classifier.is_genuine(&empty, "a"));
        assert!(classifier.is_genuine(&ProbeResponse::new(200), "a"));
    }

    #[test]
    fn test_calibration_is_set_once() {
        let classifier = Classifier::new(BTreeSet::from([200]), true);
        assert!(classifier.calibrate(baseline(200, "first")));
        assert!(!classifier.calibrate(baseline(200, "second")));
        assert_eq!(classifier.calibration().unwrap().body, b"first");
    }

    #[test]
    fn test_random_path_shape() {
        let path = random_path(CALIBRATION_PATH_LEN);
        assert_eq!(path.len(), 32);
        assert!(path.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
        assert_ne!(path, random_path(CALIBRATION_PATH_LEN));
    }
}
