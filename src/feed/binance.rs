//! Binance spot REST client

use super::{normalize_candles, Asset, Candle, PriceSource};
use crate::error::{Error, Result};
use crate::resilience::{send_json, ApiName, Endpoint};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

/// Binance REST API base URL
pub const BINANCE_API_URL: &str = "https://api.binance.com";

/// Binance caps klines per request
const MAX_KLINES: usize = 1000;

/// Client for Binance public market data
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

impl BinanceClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PriceSource for BinanceClient {
    fn api(&self) -> ApiName {
        ApiName::Binance
    }

    async fn spot_price(&self, asset: Asset) -> Result<f64> {
        let url = format!("{}/api/v3/ticker/price", self.base_url);
        let ticker: TickerPrice = send_json(
            ApiName::Binance,
            Endpoint::Read,
            self.client
                .get(&url)
                .query(&[("symbol", asset.binance_symbol())]),
        )
        .await?;
        ticker
            .price
            .parse::<f64>()
            .map_err(|e| Error::DataUnavailable(format!("binance price {:?}: {e}", ticker.price)))
    }

    async fn historical_candles(&self, asset: Asset, hours: usize) -> Result<Vec<Candle>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let limit = hours.min(MAX_KLINES).to_string();
        tracing::debug!(url = %url, hours, "Fetching Binance klines");
        let rows: Vec<Vec<Value>> = send_json(
            ApiName::Binance,
            Endpoint::Read,
            self.client.get(&url).query(&[
                ("symbol", asset.binance_symbol()),
                ("interval", "1h"),
                ("limit", limit.as_str()),
            ]),
        )
        .await?;
        Ok(normalize_candles(rows.iter().filter_map(|r| parse_kline(r)).collect()))
    }
}

/// Kline rows are `[open_time_ms, "open", "high", "low", "close", "volume", ...]`
fn parse_kline(row: &[Value]) -> Option<Candle> {
    let num = |i: usize| -> Option<f64> { row.get(i)?.as_str()?.parse().ok() };
    let open_ms = row.first()?.as_i64()?;
    Some(Candle {
        timestamp: Utc.timestamp_millis_opt(open_ms).single()?,
        open: num(1)?,
        high: num(2)?,
        low: num(3)?,
        close: num(4)?,
        volume: num(5)?,
    })
}
