//! Stale-serving snapshot cache

use super::CacheKey;
use crate::error::{Error, Result};
use crate::telemetry::{increment_counter, CounterMetric};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct Entry<T> {
    payload: Arc<Vec<T>>,
    stored_at: Instant,
    stored_wall: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StaleEvent {
    at: Instant,
    served_at: DateTime<Utc>,
    error: String,
}

/// Where a payload came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Freshness {
    /// Stored payload still within its TTL
    Cached,
    /// Fetched from a live source on this call
    Live { source: String },
    /// Every source failed; last known payload served past its TTL
    Stale { error: String },
}

/// A payload together with how fresh it is
#[derive(Debug, Clone)]
pub struct Cached<T> {
    pub payload: Arc<Vec<T>>,
    pub freshness: Freshness,
}

impl<T> Cached<T> {
    pub fn is_stale(&self) -> bool {
        matches!(self.freshness, Freshness::Stale { .. })
    }
}

/// Health report for one key
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheHealth {
    pub key: String,
    pub cached_count: Option<usize>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub seconds_since_success: Option<u64>,
    pub stale_active: bool,
    pub last_stale_at: Option<DateTime<Utc>>,
    pub seconds_since_stale: Option<u64>,
    pub last_stale_error: Option<String>,
}

/// Key-partitioned cache of last-known-good payloads.
///
/// The serving TTL and the retention window are independent: a payload past
/// its TTL is still served as stale data until retention expires.
pub struct SnapshotCache<T> {
    ttl: Duration,
    retention: Duration,
    entries: DashMap<CacheKey, Entry<T>>,
    stale_events: DashMap<CacheKey, StaleEvent>,
}

impl<T> SnapshotCache<T> {
    pub fn new(ttl: Duration, retention: Duration) -> Self {
        Self {
            ttl,
            retention,
            entries: DashMap::new(),
            stale_events: DashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Payload stored within the TTL
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<T>>> {
        self.entries
            .get(key)
            .filter(|e| e.stored_at.elapsed() <= self.ttl)
            .map(|e| e.payload.clone())
    }

    /// Most recent payload still inside the retention window, regardless of TTL
    pub fn last_known(&self, key: &CacheKey) -> Option<Arc<Vec<T>>> {
        let expired = match self.entries.get(key) {
            Some(e) if e.stored_at.elapsed() <= self.retention => return Some(e.payload.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn put(&self, key: CacheKey, payload: Vec<T>) -> Arc<Vec<T>> {
        let payload = Arc::new(payload);
        self.entries.insert(
            key,
            Entry {
                payload: payload.clone(),
                stored_at: Instant::now(),
                stored_wall: Utc::now(),
            },
        );
        payload
    }

    /// Note that stale data was served for `key` because of `error`
    pub fn record_stale_event(&self, key: &CacheKey, error: impl Display) {
        let error = error.to_string();
        tracing::warn!(key = %key, error = %error, "Serving stale snapshot");
        increment_counter(CounterMetric::StaleServed, key, "stale");
        self.stale_events.insert(
            key.clone(),
            StaleEvent {
                at: Instant::now(),
                served_at: Utc::now(),
                error,
            },
        );
    }

    /// True while a stale event for `key` is inside the retention window
    pub fn is_stale_active(&self, key: &CacheKey) -> bool {
        self.stale_event(key).is_some()
    }

    fn stale_event(&self, key: &CacheKey) -> Option<StaleEvent> {
        let expired = match self.stale_events.get(key) {
            Some(ev) if ev.at.elapsed() < self.retention => return Some(ev.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.stale_events.remove(key);
        }
        None
    }

    pub fn health(&self, key: &CacheKey) -> CacheHealth {
        let success = self.entries.get(key).and_then(|e| {
            (e.stored_at.elapsed() <= self.retention).then(|| {
                (
                    e.payload.len(),
                    e.stored_wall,
                    e.stored_at.elapsed().as_secs(),
                )
            })
        });
        let stale = self.stale_event(key);

        CacheHealth {
            key: key.to_string(),
            cached_count: success.map(|(n, _, _)| n),
            last_success_at: success.map(|(_, at, _)| at),
            seconds_since_success: success.map(|(_, _, secs)| secs),
            stale_active: stale.is_some(),
            last_stale_at: stale.as_ref().map(|s| s.served_at),
            seconds_since_stale: stale.as_ref().map(|s| s.at.elapsed().as_secs()),
            last_stale_error: stale.map(|s| s.error),
        }
    }

    /// Serve `key` from cache, else from the first source that succeeds,
    /// else from the last known payload flagged stale.
    ///
    /// Sources are tried in order. Errors only when every source fails and
    /// nothing is retained for the key.
    pub async fn get_or_fetch<'a, S, F, Fut>(
        &self,
        key: &CacheKey,
        sources: &'a [S],
        mut fetch: F,
    ) -> Result<Cached<T>>
    where
        S: Display,
        F: FnMut(&'a S) -> Fut,
        Fut: Future<Output = Result<Vec<T>>>,
    {
        if let Some(payload) = self.get(key) {
            return Ok(Cached {
                payload,
                freshness: Freshness::Cached,
            });
        }

        let mut last_error = None;
        for source in sources {
            match fetch(source).await {
                Ok(items) if !items.is_empty() => {
                    let payload = self.put(key.clone(), items);
                    return Ok(Cached {
                        payload,
                        freshness: Freshness::Live {
                            source: source.to_string(),
                        },
                    });
                }
                Ok(_) => {
                    tracing::debug!(key = %key, source = %source, "Source returned no data");
                    last_error = Some(Error::DataUnavailable(format!("{source} returned no data")));
                }
                Err(e) => {
                    tracing::debug!(key = %key, source = %source, error = %e, "Source failed");
                    last_error = Some(e);
                }
            }
        }

        let error = last_error
            .unwrap_or_else(|| Error::DataUnavailable(format!("no sources configured for {key}")));
        match self.last_known(key) {
            Some(payload) => {
                self.record_stale_event(key, &error);
                Ok(Cached {
                    payload,
                    freshness: Freshness::Stale {
                        error: error.to_string(),
                    },
                })
            }
            None => Err(error),
        }
    }
}
