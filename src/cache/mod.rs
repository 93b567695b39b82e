//! Snapshot cache
//!
//! Last-known-good payloads keyed by (asset, interval, size), served fresh
//! within a TTL and as flagged stale data when every live source fails.

mod snapshot;

pub use snapshot::{CacheHealth, Cached, Freshness, SnapshotCache};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a cached series
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Upper-case asset symbol
    pub asset: String,
    /// Candle interval, e.g. "1h"
    pub interval: String,
    /// Number of items requested
    pub size: usize,
}

impl CacheKey {
    pub fn new(asset: impl Into<String>, interval: impl Into<String>, size: usize) -> Self {
        Self {
            asset: asset.into().to_uppercase(),
            interval: interval.into(),
            size,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "candles:{}:{}:{}", self.asset, self.interval, self.size)
    }
}
