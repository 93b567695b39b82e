//! Configuration types for binary-edge
//!
//! Every section has serde defaults, so a partial file overrides only what
//! it names and `Config::default()` is the production profile.

use crate::execution::{ExecutionMode, ExecutorConfig};
use crate::feed::{BINANCE_API_URL, COINBASE_API_URL, DERIBIT_API_URL, KRAKEN_API_URL};
use crate::kalshi::KALSHI_API_URL;
use crate::market::ServiceConfig;
use crate::model::HOURLY_PERIODS_PER_YEAR;
use crate::resilience::{ApiName, ApiProfile, RetryPolicy};
use crate::signal::EngineConfig;
use crate::telemetry::LogFormat;
use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub telemetry: TelemetryConfig,
    pub feed: FeedConfig,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    /// Per-API limiter and breaker overrides, keyed by API name
    pub apis: BTreeMap<String, ApiOverride>,
    pub model: ModelConfig,
    pub signal: EngineConfig,
    pub execution: ExecutionConfig,
    pub endpoints: EndpointsConfig,
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    /// Prometheus exporter port; no exporter when unset
    pub metrics_port: Option<u16>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

/// Price source selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Spot and candle sources, tried in order
    pub sources: Vec<ApiName>,
    /// Price with the DVOL index when available
    pub use_implied_volatility: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            sources: vec![ApiName::Coinbase, ApiName::Binance, ApiName::Kraken],
            use_implied_volatility: true,
        }
    }
}

/// Candle snapshot cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Age up to which a snapshot is served as fresh
    pub ttl_secs: u64,
    /// Age up to which a snapshot may still be served as stale
    pub retention_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 60,
            retention_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs.max(self.ttl_secs))
    }
}

/// Retry budget shared by every API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms.max(self.base_delay_ms)),
        }
    }
}

/// Overrides for one API; unset fields keep the API's default profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiOverride {
    pub capacity: Option<f64>,
    /// Tokens per second
    pub refill_rate: Option<f64>,
    pub fail_threshold: Option<u32>,
    pub reset_timeout_secs: Option<u64>,
}

impl ApiOverride {
    fn apply(&self, mut profile: ApiProfile) -> ApiProfile {
        if let Some(capacity) = self.capacity {
            profile.capacity = capacity;
        }
        if let Some(rate) = self.refill_rate {
            profile.refill_rate = rate;
        }
        if let Some(threshold) = self.fail_threshold {
            profile.fail_threshold = threshold;
        }
        if let Some(secs) = self.reset_timeout_secs {
            profile.reset_timeout = Duration::from_secs(secs);
        }
        profile
    }
}

/// Volatility and order flow model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Hours of candles fetched per pass
    pub candle_hours: usize,
    /// Realized volatility window, in candles
    pub vol_window: usize,
    pub periods_per_year: f64,
    /// Probability shift per unit of order book imbalance
    pub obi_scale: f64,
    pub depth_levels: usize,
    pub depth_weighted: bool,
    pub fetch_orderbooks: bool,
    /// Listing pages read per pass
    pub max_pages: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let service = ServiceConfig::default();
        Self {
            candle_hours: service.candle_hours,
            vol_window: service.vol_window,
            periods_per_year: HOURLY_PERIODS_PER_YEAR,
            obi_scale: 0.2,
            depth_levels: 5,
            depth_weighted: service.depth_weighted,
            fetch_orderbooks: service.fetch_orderbooks,
            max_pages: service.max_pages,
        }
    }
}

impl ModelConfig {
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            candle_hours: self.candle_hours,
            vol_window: self.vol_window,
            fetch_orderbooks: self.fetch_orderbooks,
            depth_weighted: self.depth_weighted,
            max_pages: self.max_pages.max(1),
        }
    }
}

/// Execution engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub mode: ExecutionMode,
    /// Fee charged on positive realized P&L
    pub fee_rate: Decimal,
    pub client_order_prefix: String,
    /// Starting balance of the paper exchange
    pub paper_balance_cents: i64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        let executor = ExecutorConfig::default();
        Self {
            mode: ExecutionMode::Paper,
            fee_rate: executor.fee_rate,
            client_order_prefix: executor.client_order_prefix,
            paper_balance_cents: 1_000_000,
        }
    }
}

impl ExecutionConfig {
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            fee_rate: self.fee_rate,
            client_order_prefix: self.client_order_prefix.clone(),
        }
    }
}

/// Upstream base URLs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub coinbase: String,
    pub binance: String,
    pub kraken: String,
    pub kalshi: String,
    pub deribit: String,
    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            coinbase: COINBASE_API_URL.to_string(),
            binance: BINANCE_API_URL.to_string(),
            kraken: KRAKEN_API_URL.to_string(),
            kalshi: KALSHI_API_URL.to_string(),
            deribit: DERIBIT_API_URL.to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse and validate TOML text
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.profiles()?;
        anyhow::ensure!(!self.feed.sources.is_empty(), "feed.sources must name at least one source");
        anyhow::ensure!(
            !self.feed.sources.contains(&ApiName::Kalshi) && !self.feed.sources.contains(&ApiName::Deribit),
            "feed.sources may only list coinbase, binance or kraken"
        );
        anyhow::ensure!(self.cache.ttl_secs > 0, "cache.ttl_secs must be positive");
        anyhow::ensure!(self.signal.top_n > 0, "signal.top_n must be positive");
        Ok(())
    }

    /// Limiter and breaker parameters for every overridden API
    pub fn profiles(&self) -> anyhow::Result<HashMap<ApiName, ApiProfile>> {
        self.apis
            .iter()
            .map(|(name, overrides)| {
                let api: ApiName = name.parse().map_err(|e: String| anyhow::anyhow!(e))?;
                let profile = overrides.apply(api.default_profile());
                anyhow::ensure!(
                    profile.capacity > 0.0 && profile.refill_rate > 0.0,
                    "apis.{name}: capacity and refill_rate must be positive"
                );
                anyhow::ensure!(profile.fail_threshold > 0, "apis.{name}: fail_threshold must be positive");
                Ok((api, profile))
            })
            .collect()
    }
}
