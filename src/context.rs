//! Process-scoped application context
//!
//! Owns the single resilient caller, the candle cache and the services built
//! on them. Everything that would otherwise be a global lives here.

use crate::cache::{CacheHealth, SnapshotCache};
use crate::config::Config;
use crate::execution::{ExecutionMode, InMemoryTradeStore, PaperExchange, TradeExecutor};
use crate::feed::{
    Asset, BinanceClient, Candle, CoinbaseClient, DeribitClient, KrakenClient, PriceSource, VolatilityIndexSource,
};
use crate::kalshi::{KalshiClient, MarketApi, OrderApi};
use crate::market::SignalService;
use crate::model::VolatilityEstimators;
use crate::orderbook::OrderFlowAnalyzer;
use crate::resilience::{ApiName, BreakerStatus, ResilientCaller};
use crate::signal::MispricingEngine;
use anyhow::Context;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Upstream adapters the context is assembled from
pub struct Upstreams {
    /// Spot and candle sources, in fallback order
    pub sources: Vec<Arc<dyn PriceSource>>,
    pub vol_index: Option<Arc<dyn VolatilityIndexSource>>,
    pub markets: Arc<dyn MarketApi>,
    pub orders: Arc<dyn OrderApi>,
}

/// Snapshot of runtime health
#[derive(Debug, Clone, Serialize)]
pub struct ContextStatus {
    pub mode: ExecutionMode,
    pub breakers: BTreeMap<String, BreakerStatus>,
    pub candle_cache: Vec<CacheHealth>,
}

pub struct AppContext {
    config: Config,
    caller: Arc<ResilientCaller>,
    signals: Arc<SignalService>,
    executor: TradeExecutor,
}

impl AppContext {
    /// Build against the configured HTTP endpoints.
    ///
    /// In paper mode listings and books still come from the live exchange;
    /// only order entry is simulated.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let endpoints = &config.endpoints;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(endpoints.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        let sources = config
            .feed
            .sources
            .iter()
            .filter_map(|api| -> Option<Arc<dyn PriceSource>> {
                match api {
                    ApiName::Coinbase => Some(Arc::new(CoinbaseClient::new(client.clone(), &endpoints.coinbase))),
                    ApiName::Binance => Some(Arc::new(BinanceClient::new(client.clone(), &endpoints.binance))),
                    ApiName::Kraken => Some(Arc::new(KrakenClient::new(client.clone(), &endpoints.kraken))),
                    ApiName::Kalshi | ApiName::Deribit => None,
                }
            })
            .collect();
        let vol_index = config
            .feed
            .use_implied_volatility
            .then(|| Arc::new(DeribitClient::new(client.clone(), &endpoints.deribit)) as Arc<dyn VolatilityIndexSource>);

        let kalshi = Arc::new(KalshiClient::new(client, &endpoints.kalshi));
        let markets: Arc<dyn MarketApi> = kalshi.clone();
        let orders: Arc<dyn OrderApi> = match config.execution.mode {
            ExecutionMode::Paper => Arc::new(
                PaperExchange::new(config.execution.paper_balance_cents).with_market_data(markets.clone()),
            ),
            ExecutionMode::Live => {
                tracing::warn!("Live mode without a request signer; order endpoints will reject");
                kalshi
            }
        };

        Self::with_upstreams(
            config,
            Upstreams {
                sources,
                vol_index,
                markets,
                orders,
            },
        )
    }

    /// Build around an in-process paper exchange serving both market data
    /// and order entry
    pub fn paper(config: Config, sources: Vec<Arc<dyn PriceSource>>, exchange: Arc<PaperExchange>) -> anyhow::Result<Self> {
        Self::with_upstreams(
            config,
            Upstreams {
                sources,
                vol_index: None,
                markets: exchange.clone(),
                orders: exchange,
            },
        )
    }

    pub fn with_upstreams(config: Config, upstreams: Upstreams) -> anyhow::Result<Self> {
        anyhow::ensure!(!upstreams.sources.is_empty(), "No price sources configured");

        let caller = Arc::new(ResilientCaller::new(&config.profiles()?, config.retry.policy()));
        let cache = Arc::new(SnapshotCache::<Candle>::new(config.cache.ttl(), config.cache.retention()));

        let model = &config.model;
        let engine = MispricingEngine::new(
            config.signal.clone(),
            OrderFlowAnalyzer::new(model.obi_scale, model.depth_levels),
        );
        let signals = Arc::new(SignalService::new(
            upstreams.sources,
            upstreams.vol_index,
            upstreams.markets.clone(),
            caller.clone(),
            cache,
            VolatilityEstimators::new(model.periods_per_year),
            engine,
            model.service_config(),
        ));

        let executor = TradeExecutor::new(
            upstreams.orders,
            upstreams.markets,
            Arc::new(InMemoryTradeStore::new()),
            caller.clone(),
            config.execution.executor_config(),
        );

        tracing::info!(mode = ?config.execution.mode, "Application context ready");
        Ok(Self {
            config,
            caller,
            signals,
            executor,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn caller(&self) -> &Arc<ResilientCaller> {
        &self.caller
    }

    pub fn signals(&self) -> &Arc<SignalService> {
        &self.signals
    }

    pub fn executor(&self) -> &TradeExecutor {
        &self.executor
    }

    pub fn breaker_status(&self) -> BTreeMap<String, BreakerStatus> {
        self.caller.breaker_status()
    }

    pub fn status(&self) -> ContextStatus {
        ContextStatus {
            mode: self.config.execution.mode,
            breakers: self.breaker_status(),
            candle_cache: Asset::ALL
                .iter()
                .map(|asset| self.signals.default_cache_health(*asset))
                .collect(),
        }
    }
}
