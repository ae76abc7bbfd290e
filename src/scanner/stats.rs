// src/scanner/stats.rs
// =============================================================================
// Counters for one scan phase.
//
// Workers bump success/failed, the orchestrator sets total and the end time.
// A recursive scan starts a fresh ScanStats for every branch.
// =============================================================================

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ScanStats {
    /// Words enqueued for this phase
    pub total: usize,
    /// Probes that produced a reported result
    pub success: usize,
    /// Probes that errored, missed the match set, or looked like a soft 404
    pub failed: usize,
    pub started_at: Instant,
    pub finished_at: Option<Instant>,
}

impl Default for ScanStats {
    fn default() -> Self {
        Self::started_now()
    }
}

impl ScanStats {
    pub fn started_now() -> Self {
        Self {
            total: 0,
            success: 0,
            failed: 0,
            started_at: Instant::now(),
            finished_at: None,
        }
    }

    /// Wall-clock duration of the phase, or time so far if it has not ended.
    pub fn elapsed(&self) -> Duration {
        match self.finished_at {
            Some(end) if end > self.started_at => end - self.started_at,
            _ => self.started_at.elapsed(),
        }
    }

    pub fn requests_per_second(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.total as f64 / secs
        } else {
            0.0
        }
    }
}
