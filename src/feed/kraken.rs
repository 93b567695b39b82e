//! Kraken public REST client

use super::{normalize_candles, Asset, Candle, PriceSource};
use crate::error::{Error, Result};
use crate::resilience::{send_json, ApiName, Endpoint};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Kraken REST API base URL
pub const KRAKEN_API_URL: &str = "https://api.kraken.com";

/// Client for Kraken public market data
pub struct KrakenClient {
    client: Client,
    base_url: String,
}

/// Kraken wraps every payload as `{ error: [...], result: {...} }`
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: Map<String, Value>,
}

impl Envelope {
    /// The pair entry of `result`, skipping the `last` cursor
    fn into_pair(self) -> Result<Value> {
        if !self.error.is_empty() {
            return Err(Error::DataUnavailable(format!("kraken: {}", self.error.join(", "))));
        }
        self.result
            .into_iter()
            .find(|(k, _)| k != "last")
            .map(|(_, v)| v)
            .ok_or_else(|| Error::DataUnavailable("kraken: empty result".to_string()))
    }
}

impl KrakenClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PriceSource for KrakenClient {
    fn api(&self) -> ApiName {
        ApiName::Kraken
    }

    async fn spot_price(&self, asset: Asset) -> Result<f64> {
        let url = format!("{}/0/public/Ticker", self.base_url);
        let envelope: Envelope = send_json(
            ApiName::Kraken,
            Endpoint::Read,
            self.client.get(&url).query(&[("pair", asset.kraken_pair())]),
        )
        .await?;
        // Last trade is `c: [price, lot volume]`
        envelope
            .into_pair()?
            .get("c")
            .and_then(|c| c.get(0))
            .and_then(Value::as_str)
            .and_then(|p| p.parse::<f64>().ok())
            .ok_or_else(|| Error::DataUnavailable("kraken: missing last trade".to_string()))
    }

    async fn historical_candles(&self, asset: Asset, hours: usize) -> Result<Vec<Candle>> {
        let url = format!("{}/0/public/OHLC", self.base_url);
        let envelope: Envelope = send_json(
            ApiName::Kraken,
            Endpoint::Read,
            self.client
                .get(&url)
                .query(&[("pair", asset.kraken_pair()), ("interval", "60")]),
        )
        .await?;
        let rows = envelope.into_pair()?;
        let candles = rows
            .as_array()
            .map(|rows| rows.iter().filter_map(parse_ohlc).collect())
            .unwrap_or_default();
        let mut candles = normalize_candles(candles);
        let skip = candles.len().saturating_sub(hours);
        candles.drain(..skip);
        Ok(candles)
    }
}

/// Rows are `[time, "open", "high", "low", "close", "vwap", "volume", count]`
fn parse_ohlc(row: &Value) -> Option<Candle> {
    let row = row.as_array()?;
    let num = |i: usize| -> Option<f64> { row.get(i)?.as_str()?.parse().ok() };
    Some(Candle {
        timestamp: Utc.timestamp_opt(row.first()?.as_i64()?, 0).single()?,
        open: num(1)?,
        high: num(2)?,
        low: num(3)?,
        close: num(4)?,
        volume: num(6)?,
    })
}
