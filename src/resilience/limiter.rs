//! Token-bucket rate limiter with lazy refill
//!
//! Tokens accrue at `refill_rate` per second up to `capacity`; refill is
//! computed on each acquire from the time since the last refill. A backoff
//! multiplier scales the cost of every request while an upstream keeps
//! answering 429, without touching the base bucket parameters.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Upper bound for the 429 backoff multiplier
const MAX_BACKOFF_MULTIPLIER: f64 = 8.0;

/// Outcome of a single acquire attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Acquisition {
    /// Tokens were deducted
    Granted,
    /// Not enough tokens; wait this long for the deficit to accrue
    Wait(Duration),
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
    backoff_multiplier: f64,
}

/// Mutex-guarded token bucket, one per upstream API
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
                backoff_multiplier: 1.0,
            }),
        }
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Refill, then deduct `cost` (scaled by the backoff multiplier) or report
    /// the wait needed for it to accrue.
    pub fn try_acquire(&self, cost: f64) -> Acquisition {
        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.capacity);
        state.last_refill = now;

        // Clamped so a heavily penalized request can still run on a full bucket
        let effective = (cost * state.backoff_multiplier).min(self.capacity);
        if state.tokens >= effective {
            state.tokens -= effective;
            return Acquisition::Granted;
        }

        let deficit = effective - state.tokens;
        if self.refill_rate <= 0.0 {
            return Acquisition::Wait(Duration::MAX);
        }
        Acquisition::Wait(Duration::from_secs_f64(deficit / self.refill_rate))
    }

    /// Acquire, sleeping once for the reported deficit if needed.
    ///
    /// Returns `false` when the second attempt still falls short; the caller
    /// proceeds and relies on its own retry loop for any resulting 429.
    pub async fn wait_and_acquire(&self, cost: f64) -> bool {
        match self.try_acquire(cost) {
            Acquisition::Granted => true,
            Acquisition::Wait(wait) => {
                tracing::debug!(wait_ms = wait.as_millis() as u64, "Rate limiter waiting");
                tokio::time::sleep(wait).await;
                matches!(self.try_acquire(cost), Acquisition::Granted)
            }
        }
    }

    /// Double the cost multiplier after a 429
    pub fn penalize(&self) -> f64 {
        let mut state = self.state.lock();
        state.backoff_multiplier = (state.backoff_multiplier * 2.0).min(MAX_BACKOFF_MULTIPLIER);
        state.backoff_multiplier
    }

    /// Decay the cost multiplier halfway back toward 1.0 after a success
    pub fn relax(&self) -> f64 {
        let mut state = self.state.lock();
        state.backoff_multiplier = 1.0 + (state.backoff_multiplier - 1.0) / 2.0;
        if state.backoff_multiplier < 1.0 + 1e-3 {
            state.backoff_multiplier = 1.0;
        }
        state.backoff_multiplier
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.state.lock().backoff_multiplier
    }

    /// Tokens currently available, after refill
    pub fn available(&self) -> f64 {
        let state = self.state.lock();
        let elapsed = Instant::now().duration_since(state.last_refill).as_secs_f64();
        (state.tokens + elapsed * self.refill_rate).min(self.capacity)
    }
}
