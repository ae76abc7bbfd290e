// src/scanner/rate.rs
// =============================================================================
// Token-bucket rate limiter shared by all workers.
//
// How it works:
// 1. A semaphore holds the tokens; it starts full (capacity = rate)
// 2. A background task adds one token every 1/rate seconds
// 3. If the bucket is already full, that tick is simply skipped
// 4. acquire() takes a token and never gives it back
//
// With rate = 0 there is no bucket at all and acquire() returns at once.
//
// Rust concepts:
// - tokio::sync::Semaphore: an async counting semaphore
// - JoinHandle::abort: stops the refill task when the limiter is dropped
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

#[derive(Debug)]
pub struct RateLimiter {
    bucket: Option<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: Arc<Semaphore>,
    refill: JoinHandle<()>,
}

impl RateLimiter {
    /// Creates a limiter allowing `rate` requests per second.
    ///
    /// Must be called from within a tokio runtime when `rate > 0`, since the
    /// refill task is spawned here.
    pub fn new(rate: u32) -> Self {
        if rate == 0 {
            return Self::unlimited();
        }

        let capacity = rate as usize;
        let tokens = Arc::new(Semaphore::new(capacity));
        let period = (Duration::from_secs(1) / rate).max(Duration::from_nanos(1));
        let refill = tokio::spawn(refill_loop(Arc::clone(&tokens), capacity, period));

        Self {
            bucket: Some(Bucket { tokens, refill }),
        }
    }

    pub fn unlimited() -> Self {
        Self { bucket: None }
    }

    /// Waits until a token is available and consumes it.
    pub async fn acquire(&self) {
        let Some(bucket) = &self.bucket else {
            return;
        };

        // The semaphore is never closed, so acquire only fails on shutdown
        if let Ok(permit) = bucket.tokens.acquire().await {
            permit.forget();
        }
    }

    /// Tokens currently in the bucket (`None` when unlimited).
    #[cfg(test)]
    pub fn available(&self) -> Option<usize> {
        self.bucket.as_ref().map(|b| b.tokens.available_permits())
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        if let Some(bucket) = &self.bucket {
            bucket.refill.abort();
        }
    }
}

async fn refill_loop(tokens: Arc<Semaphore>, capacity: usize, period: Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    // After a stall, resume the normal cadence instead of bursting
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        // Only this task adds tokens, so check-then-add cannot overshoot
        if tokens.available_permits() < capacity {
            tokens.add_permits(1);
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why permit.forget()?
//    - A SemaphorePermit normally returns its token when dropped
//    - Here a token is "spent" by sending a request, so we forget it
//    - Only the refill task ever puts tokens back
//
// 2. What is let-else?
//    - `let Some(x) = value else { return; };`
//    - Binds x if the pattern matches, otherwise runs the else block
//    - The else block must leave the function (return, break, panic...)
// -----------------------------------------------------------------------------
