//! Signal pipeline for one asset
//!
//! spot + cached candles → volatility → contract listing → order books →
//! mispricing engine → ranked signals. Every outbound call goes through the
//! resilient caller.

use super::{earliest_expiry_group, ContractQuote};
use crate::cache::{CacheHealth, CacheKey, Freshness, SnapshotCache};
use crate::error::{Error, Result};
use crate::feed::{Asset, Candle, PriceSource, VolatilityIndexSource};
use crate::kalshi::MarketApi;
use crate::model::{VolatilityEstimators, VolatilitySummary};
use crate::orderbook::FlowSignal;
use crate::resilience::{ApiName, ResilientCaller};
use crate::signal::{MispricingEngine, Signal};
use crate::telemetry::{increment_counter, record_latency, set_gauge, CounterMetric, GaugeMetric, LatencyMetric};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Candle interval requested from every source
pub const CANDLE_INTERVAL: &str = "1h";

/// Pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Hours of candles feeding the estimators. The HAR-RV forecast needs
    /// more than 720.
    pub candle_hours: usize,
    /// Realized volatility window, in candles
    pub vol_window: usize,
    /// Fetch each contract's book for the order flow adjustment
    pub fetch_orderbooks: bool,
    /// Weight near-touch levels more heavily when reading imbalance
    pub depth_weighted: bool,
    /// Listing pages read before giving up on the cursor
    pub max_pages: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            candle_hours: 744,
            vol_window: 24,
            fetch_orderbooks: true,
            depth_weighted: false,
            max_pages: 10,
        }
    }
}

/// Everything computed for an asset in one pass
#[derive(Debug, Clone, Serialize)]
pub struct MarketAnalysis {
    pub asset: Asset,
    pub spot: f64,
    pub volatility: VolatilitySummary,
    pub candle_count: usize,
    /// Candles came from the last-known snapshot after every source failed
    pub candles_stale: bool,
    /// Expiry of the contract group priced
    pub expiry: Option<DateTime<Utc>>,
    pub contracts_considered: usize,
    /// Ranked, best EV first
    pub signals: Vec<Signal>,
    pub generated_at: DateTime<Utc>,
}

/// Builds ranked signals from market data
pub struct SignalService {
    sources: Vec<Arc<dyn PriceSource>>,
    vol_index: Option<Arc<dyn VolatilityIndexSource>>,
    markets: Arc<dyn MarketApi>,
    caller: Arc<ResilientCaller>,
    cache: Arc<SnapshotCache<Candle>>,
    estimators: VolatilityEstimators,
    engine: MispricingEngine,
    config: ServiceConfig,
}

impl SignalService {
    /// `sources` are tried in order for both spot and candles
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sources: Vec<Arc<dyn PriceSource>>,
        vol_index: Option<Arc<dyn VolatilityIndexSource>>,
        markets: Arc<dyn MarketApi>,
        caller: Arc<ResilientCaller>,
        cache: Arc<SnapshotCache<Candle>>,
        estimators: VolatilityEstimators,
        engine: MispricingEngine,
        config: ServiceConfig,
    ) -> Self {
        Self {
            sources,
            vol_index,
            markets,
            caller,
            cache,
            estimators,
            engine,
            config,
        }
    }

    /// Top-N signals for `asset`, best EV first
    pub async fn get_ranked_signals(&self, asset: Asset) -> Result<Vec<Signal>> {
        Ok(self.analyze(asset).await?.signals)
    }

    /// Health of a candle snapshot
    pub fn candle_cache_health(&self, asset: Asset, interval: &str, size: usize) -> CacheHealth {
        self.cache.health(&CacheKey::new(asset.as_str(), interval, size))
    }

    /// Health of the snapshot this service prices from
    pub fn default_cache_health(&self, asset: Asset) -> CacheHealth {
        self.candle_cache_health(asset, CANDLE_INTERVAL, self.config.candle_hours)
    }

    /// Full pass for `asset`.
    ///
    /// Fails only when no spot price or contract listing can be obtained;
    /// missing candles, DVOL or books degrade to defaults.
    pub async fn analyze(&self, asset: Asset) -> Result<MarketAnalysis> {
        let started = Instant::now();
        let now = Utc::now();

        let (spot, (candles, candles_stale), implied, quotes) = tokio::join!(
            self.spot_price(asset),
            self.candles(asset),
            self.implied_volatility(asset),
            self.list_contracts(asset),
        );
        let spot = spot?;
        let quotes = quotes?;
        let volatility = VolatilitySummary::build(&self.estimators, &candles, self.config.vol_window, implied);
        set_gauge(GaugeMetric::CurrentVolatility, volatility.pricing.value);

        let group = earliest_expiry_group(quotes, now);
        let expiry = group.first().map(|q| q.expiry);
        let flows = self.order_flow(&group).await;

        let evaluated: Vec<Signal> = group
            .iter()
            .zip(flows)
            .map(|(quote, flow)| self.engine.evaluate(quote, spot, volatility.pricing.value, flow, now))
            .collect();
        let contracts_considered = evaluated.len();
        let signals = self.engine.rank(evaluated);

        for signal in signals.iter().filter(|s| s.side().is_some()) {
            increment_counter(CounterMetric::SignalEmitted, asset, signal.action.as_str());
        }
        record_latency(LatencyMetric::SignalGeneration, asset, started.elapsed());
        info!(
            asset = %asset,
            spot,
            vol = volatility.pricing.value,
            method = ?volatility.pricing.method,
            contracts = contracts_considered,
            actionable = signals.iter().filter(|s| s.side().is_some()).count(),
            "Signals generated"
        );

        Ok(MarketAnalysis {
            asset,
            spot,
            candle_count: candles.len(),
            candles_stale,
            volatility,
            expiry,
            contracts_considered,
            signals,
            generated_at: now,
        })
    }

    async fn spot_price(&self, asset: Asset) -> Result<f64> {
        let mut last_error = None;
        for source in &self.sources {
            match self
                .caller
                .call(source.api(), 1.0, || source.spot_price(asset))
                .await
            {
                Ok(price) if price > 0.0 => return Ok(price),
                Ok(price) => {
                    last_error = Some(Error::DataUnavailable(format!("{} quoted {price}", source.api())));
                }
                Err(e) => {
                    warn!(asset = %asset, source = %source.api(), error = %e, "Spot price source failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| Error::DataUnavailable("no price sources configured".into())))
    }

    /// Candles from cache or the source chain; empty when nothing is available
    async fn candles(&self, asset: Asset) -> (Arc<Vec<Candle>>, bool) {
        let hours = self.config.candle_hours;
        let key = CacheKey::new(asset.as_str(), CANDLE_INTERVAL, hours);
        let caller = &self.caller;
        let result = self
            .cache
            .get_or_fetch(&key, &self.sources, |source| async move {
                let cost = source.candle_requests(hours) as f64;
                caller
                    .call(source.api(), cost, || source.historical_candles(asset, hours))
                    .await
            })
            .await;

        match result {
            Ok(cached) => {
                if let Freshness::Live { source } = &cached.freshness {
                    debug!(asset = %asset, source = %source, count = cached.payload.len(), "Candles fetched");
                }
                let stale = cached.is_stale();
                (cached.payload, stale)
            }
            Err(e) => {
                warn!(asset = %asset, error = %e, "No candles available, using default volatility");
                (Arc::new(Vec::new()), false)
            }
        }
    }

    async fn implied_volatility(&self, asset: Asset) -> Option<f64> {
        let source = self.vol_index.as_ref()?;
        asset.dvol_currency()?;
        match self
            .caller
            .call(source.api(), 1.0, || source.volatility_index(asset))
            .await
        {
            Ok(iv) => Some(iv),
            Err(e) => {
                debug!(asset = %asset, error = %e, "Implied volatility unavailable, falling back to realized");
                None
            }
        }
    }

    /// Every parseable contract in the asset's series, following the cursor
    async fn list_contracts(&self, asset: Asset) -> Result<Vec<ContractQuote>> {
        let series = asset.series_ticker();
        let mut listed = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 1..=self.config.max_pages {
            let current = cursor.take();
            let response = self
                .caller
                .call(ApiName::Kalshi, 1.0, || self.markets.markets_page(series, current.as_deref()))
                .await?;
            debug!(series, page, count = response.markets.len(), "Listing page");
            listed.extend(response.markets);
            match response.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        if cursor.is_some() {
            warn!(series, max_pages = self.config.max_pages, "Listing truncated at page limit");
        }

        let total = listed.len();
        let quotes: Vec<ContractQuote> = listed.into_iter().filter_map(|m| m.into_quote()).collect();
        if quotes.len() < total {
            debug!(series, skipped = total - quotes.len(), "Contracts without strike or expiry skipped");
        }
        Ok(quotes)
    }

    /// Imbalance per contract, concurrently; `None` where the book failed
    async fn order_flow(&self, group: &[ContractQuote]) -> Vec<Option<FlowSignal>> {
        if !self.config.fetch_orderbooks {
            return vec![None; group.len()];
        }
        let analyzer = self.engine.flow_analyzer();
        join_all(group.iter().map(|quote| async move {
            match self
                .caller
                .call(ApiName::Kalshi, 1.0, || self.markets.orderbook(&quote.ticker))
                .await
            {
                Ok(book) if self.config.depth_weighted => Some(analyzer.depth_weighted_imbalance(&book)),
                Ok(book) => Some(analyzer.imbalance(&book)),
                Err(e) => {
                    debug!(ticker = %quote.ticker, error = %e, "Order book unavailable");
                    None
                }
            }
        }))
        .await
    }
}
