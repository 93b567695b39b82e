//! Coinbase Exchange REST client

use super::{normalize_candles, Asset, Candle, PriceSource};
use crate::error::{Error, Result};
use crate::resilience::{send_json, ApiName, Endpoint};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;

/// Coinbase Exchange public API base URL
pub const COINBASE_API_URL: &str = "https://api.exchange.coinbase.com";

/// Most candles Coinbase returns for one request
const MAX_CANDLES_PER_REQUEST: usize = 300;

/// Client for Coinbase public market data
pub struct CoinbaseClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    price: String,
}

impl CoinbaseClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PriceSource for CoinbaseClient {
    fn api(&self) -> ApiName {
        ApiName::Coinbase
    }

    async fn spot_price(&self, asset: Asset) -> Result<f64> {
        let url = format!("{}/products/{}/ticker", self.base_url, asset.coinbase_product());
        let ticker: Ticker = send_json(ApiName::Coinbase, Endpoint::Read, self.client.get(&url)).await?;
        ticker
            .price
            .parse::<f64>()
            .map_err(|e| Error::DataUnavailable(format!("coinbase price {:?}: {e}", ticker.price)))
    }

    fn candle_requests(&self, hours: usize) -> usize {
        hours.div_ceil(MAX_CANDLES_PER_REQUEST).max(1)
    }

    /// Walks back from now in windows of at most 300 candles
    async fn historical_candles(&self, asset: Asset, hours: usize) -> Result<Vec<Candle>> {
        let url = format!("{}/products/{}/candles", self.base_url, asset.coinbase_product());
        let windows = candle_windows(Utc::now(), hours);
        tracing::debug!(url = %url, hours, pages = windows.len(), "Fetching Coinbase candles");

        let mut rows = Vec::with_capacity(hours);
        for (start, end) in windows {
            let page: Vec<[f64; 6]> = send_json(
                ApiName::Coinbase,
                Endpoint::Read,
                self.client.get(&url).query(&[
                    ("granularity", "3600".to_string()),
                    ("start", start.to_rfc3339()),
                    ("end", end.to_rfc3339()),
                ]),
            )
            .await?;
            let exhausted = page.is_empty();
            rows.extend(page);
            if exhausted {
                break;
            }
        }
        Ok(parse_candles(rows, hours))
    }
}

/// `[start, end]` request windows covering the `hours` candles up to `end`,
/// newest first
fn candle_windows(end: DateTime<Utc>, hours: usize) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut windows = Vec::new();
    let mut remaining = hours.max(1);
    let mut window_end = end;
    while remaining > 0 {
        let count = remaining.min(MAX_CANDLES_PER_REQUEST);
        let window_start = window_end - ChronoDuration::hours(count as i64 - 1);
        windows.push((window_start, window_end));
        window_end = window_start - ChronoDuration::hours(1);
        remaining -= count;
    }
    windows
}

/// Rows are `[time, low, high, open, close, volume]`, newest first
fn parse_candles(rows: Vec<[f64; 6]>, hours: usize) -> Vec<Candle> {
    let candles = rows
        .into_iter()
        .filter_map(|[time, low, high, open, close, volume]| {
            Some(Candle {
                timestamp: Utc.timestamp_opt(time as i64, 0).single()?,
                open,
                high,
                low,
                close,
                volume,
            })
        })
        .collect();
    let mut candles = normalize_candles(candles);
    let skip = candles.len().saturating_sub(hours);
    candles.drain(..skip);
    candles
}
