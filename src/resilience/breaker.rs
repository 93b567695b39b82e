//! Circuit breaker
//!
//! CLOSED → OPEN after `fail_threshold` consecutive failures, OPEN → HALF_OPEN
//! once `reset_timeout` has elapsed (checked on the next call), HALF_OPEN →
//! CLOSED on success or back to OPEN on failure.

use super::ApiName;
use crate::error::{Error, Result};
use crate::telemetry::{increment_counter, CounterMetric};
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

/// Snapshot reported by health checks
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BreakerStatus {
    pub state: BreakerState,
    pub fail_count: u32,
    pub fail_max: u32,
}

/// Observer of breaker transitions and failures
pub trait BreakerListener: Send + Sync {
    fn on_transition(&self, breaker: ApiName, from: BreakerState, to: BreakerState);
    fn on_failure(&self, breaker: ApiName, error: &Error, consecutive: u32);
}

/// Listener that logs transitions and records a transition counter
pub struct LoggingListener;

impl BreakerListener for LoggingListener {
    fn on_transition(&self, breaker: ApiName, from: BreakerState, to: BreakerState) {
        match to {
            BreakerState::Open => tracing::error!(
                api = %breaker,
                from = from.as_str(),
                "Circuit breaker OPEN, failing fast"
            ),
            BreakerState::HalfOpen => tracing::info!(
                api = %breaker,
                "Circuit breaker HALF_OPEN, probing upstream"
            ),
            BreakerState::Closed => tracing::info!(
                api = %breaker,
                from = from.as_str(),
                "Circuit breaker CLOSED, upstream recovered"
            ),
        }
        increment_counter(CounterMetric::BreakerTransition, breaker, to.as_str());
    }

    fn on_failure(&self, breaker: ApiName, error: &Error, consecutive: u32) {
        tracing::warn!(
            api = %breaker,
            consecutive,
            error = %error,
            "Circuit breaker recorded failure"
        );
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Per-API circuit breaker
pub struct CircuitBreaker {
    name: ApiName,
    fail_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<Inner>,
    listeners: Vec<Arc<dyn BreakerListener>>,
}

impl CircuitBreaker {
    pub fn new(name: ApiName, fail_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            name,
            fail_threshold: fail_threshold.max(1),
            reset_timeout,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
            listeners: vec![],
        }
    }

    /// Attach a transition listener
    pub fn with_listener(mut self, listener: Arc<dyn BreakerListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn name(&self) -> ApiName {
        self.name
    }

    /// Current state, without applying the reset timeout
    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    pub fn status(&self) -> BreakerStatus {
        let inner = self.inner.lock();
        BreakerStatus {
            state: inner.state,
            fail_count: inner.consecutive_failures,
            fail_max: self.fail_threshold,
        }
    }

    /// Run `fut` through the breaker.
    ///
    /// While open the future is dropped unpolled and `ServiceUnavailable` is
    /// returned. Only errors for which [`Error::counts_as_breaker_failure`]
    /// holds advance the failure count.
    pub async fn call<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.before_call()?;
        let result = fut.await;
        match &result {
            Ok(_) => self.on_success(),
            Err(e) if e.counts_as_breaker_failure() => self.on_failure(e),
            Err(_) => self.on_neutral(),
        }
        result
    }

    fn before_call(&self) -> Result<()> {
        let transition = {
            let mut inner = self.inner.lock();
            match inner.state {
                BreakerState::Open => {
                    let elapsed = inner
                        .opened_at
                        .map(|at| at.elapsed())
                        .unwrap_or(Duration::ZERO);
                    if elapsed < self.reset_timeout {
                        return Err(Error::ServiceUnavailable { breaker: self.name });
                    }
                    inner.state = BreakerState::HalfOpen;
                    Some((BreakerState::Open, BreakerState::HalfOpen))
                }
                _ => None,
            }
        };
        if let Some((from, to)) = transition {
            self.notify_transition(from, to);
        }
        Ok(())
    }

    fn on_success(&self) {
        let transition = {
            let mut inner = self.inner.lock();
            inner.consecutive_failures = 0;
            if inner.state != BreakerState::Closed {
                let from = inner.state;
                inner.state = BreakerState::Closed;
                inner.opened_at = None;
                Some((from, BreakerState::Closed))
            } else {
                None
            }
        };
        if let Some((from, to)) = transition {
            self.notify_transition(from, to);
        }
    }

    fn on_failure(&self, error: &Error) {
        let (consecutive, transition) = {
            let mut inner = self.inner.lock();
            inner.consecutive_failures += 1;
            let from = inner.state;
            let trip = match from {
                BreakerState::HalfOpen => true,
                BreakerState::Closed => inner.consecutive_failures >= self.fail_threshold,
                BreakerState::Open => false,
            };
            if trip {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
            }
            (
                inner.consecutive_failures,
                trip.then_some((from, BreakerState::Open)),
            )
        };
        for listener in &self.listeners {
            listener.on_failure(self.name, error, consecutive);
        }
        if let Some((from, to)) = transition {
            self.notify_transition(from, to);
        }
    }

    /// A non-counting error during a half-open trial call releases the slot
    /// back to open without extending the failure streak.
    fn on_neutral(&self) {
        let transition = {
            let mut inner = self.inner.lock();
            if inner.state == BreakerState::HalfOpen {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                Some((BreakerState::HalfOpen, BreakerState::Open))
            } else {
                None
            }
        };
        if let Some((from, to)) = transition {
            self.notify_transition(from, to);
        }
    }

    fn notify_transition(&self, from: BreakerState, to: BreakerState) {
        for listener in &self.listeners {
            listener.on_transition(self.name, from, to);
        }
    }
}
