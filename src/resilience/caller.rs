//! Single entry point for outbound calls
//!
//! Every request runs as `breaker.call(limiter.wait_and_acquire(cost) → op)`
//! inside a bounded retry loop. Limiter, breaker and order-submission mutex
//! are per API and live for the whole process.

use super::{ApiName, ApiProfile, BreakerStatus, CircuitBreaker, LoggingListener, RetryPolicy, TokenBucket};
use crate::error::{Error, Result};
use crate::telemetry::{increment_counter, record_latency, CounterMetric, LatencyMetric};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct ApiGuard {
    limiter: TokenBucket,
    breaker: CircuitBreaker,
    policy: RetryPolicy,
    submission: Arc<Mutex<()>>,
}

impl ApiGuard {
    fn new(api: ApiName, profile: ApiProfile, policy: RetryPolicy) -> Self {
        Self {
            limiter: TokenBucket::new(profile.capacity, profile.refill_rate),
            breaker: CircuitBreaker::new(api, profile.fail_threshold, profile.reset_timeout)
                .with_listener(Arc::new(LoggingListener)),
            policy,
            submission: Arc::new(Mutex::new(())),
        }
    }
}

/// Rate-limited, circuit-broken, retrying wrapper for outbound calls
pub struct ResilientCaller {
    // Indexed by `ApiName as usize`, one entry per API in `ApiName::ALL`
    guards: Vec<ApiGuard>,
}

impl ResilientCaller {
    /// Build with per-API overrides; APIs missing from `profiles` use their
    /// default profile.
    pub fn new(profiles: &HashMap<ApiName, ApiProfile>, policy: RetryPolicy) -> Self {
        let guards = ApiName::ALL
            .iter()
            .map(|api| {
                let profile = profiles
                    .get(api)
                    .copied()
                    .unwrap_or_else(|| api.default_profile());
                ApiGuard::new(*api, profile, policy)
            })
            .collect();
        Self { guards }
    }

    /// Production defaults for every API
    pub fn with_defaults() -> Self {
        Self::new(&HashMap::new(), RetryPolicy::default())
    }

    fn guard(&self, api: ApiName) -> &ApiGuard {
        &self.guards[api as usize]
    }

    pub fn limiter(&self, api: ApiName) -> &TokenBucket {
        &self.guard(api).limiter
    }

    pub fn breaker(&self, api: ApiName) -> &CircuitBreaker {
        &self.guard(api).breaker
    }

    /// Mutex serializing order submission to `api`.
    ///
    /// Held only around submission, never around reads.
    pub fn submission_lock(&self, api: ApiName) -> Arc<Mutex<()>> {
        self.guard(api).submission.clone()
    }

    /// Breaker state of every API, keyed by name
    pub fn breaker_status(&self) -> BTreeMap<String, BreakerStatus> {
        ApiName::ALL
            .iter()
            .map(|api| (api.to_string(), self.breaker(*api).status()))
            .collect()
    }

    /// Run `op` against `api` with rate limiting, circuit breaking and retry.
    ///
    /// `op` is invoked once per attempt. `ServiceUnavailable` and
    /// non-retryable errors return immediately; transient failures and 429s
    /// are retried until the attempt budget runs out, after which the last
    /// error is returned.
    pub async fn call<T, F, Fut>(&self, api: ApiName, cost: f64, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let guard = self.guard(api);
        let policy = guard.policy;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let started = Instant::now();
            let result = guard
                .breaker
                .call(async {
                    if !guard.limiter.wait_and_acquire(cost).await {
                        tracing::debug!(api = %api, "Rate limiter still short after wait, proceeding");
                    }
                    op().await
                })
                .await;
            record_latency(LatencyMetric::ApiCall, api, started.elapsed());

            let err = match result {
                Ok(value) => {
                    guard.limiter.relax();
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= policy.max_attempts {
                tracing::warn!(api = %api, attempts = attempt, error = %err, "Retries exhausted");
                return Err(err);
            }

            let delay = match &err {
                Error::RateLimited { retry_after, .. } => {
                    let multiplier = guard.limiter.penalize();
                    increment_counter(CounterMetric::RateLimited, api, "429");
                    tracing::warn!(
                        api = %api,
                        multiplier,
                        retry_after_ms = retry_after.map(|d| d.as_millis() as u64),
                        "Rate limited by upstream"
                    );
                    retry_after.unwrap_or_else(|| policy.backoff(attempt))
                }
                _ => policy.backoff(attempt),
            };

            increment_counter(CounterMetric::Retry, api, err.kind_label());
            tracing::warn!(
                api = %api,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying call"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
