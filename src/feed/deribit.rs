//! Deribit DVOL implied-volatility index

use super::{Asset, VolatilityIndexSource};
use crate::error::{Error, Result};
use crate::resilience::{send_json, ApiName, Endpoint};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

/// Deribit public API base URL
pub const DERIBIT_API_URL: &str = "https://www.deribit.com/api/v2";

/// Client for the Deribit volatility index
pub struct DeribitClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
}

impl DeribitClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// `get_index` sometimes carries `{CUR}_DVOL` directly
    async fn from_index(&self, currency: &str) -> Result<Option<f64>> {
        let url = format!("{}/public/get_index", self.base_url);
        let response: RpcResponse = send_json(
            ApiName::Deribit,
            Endpoint::Read,
            self.client.get(&url).query(&[("currency", currency)]),
        )
        .await?;
        Ok(response
            .result
            .as_ref()
            .and_then(|r| r.get(format!("{currency}_DVOL")))
            .and_then(Value::as_f64)
            .map(normalize_dvol))
    }

    /// Latest hourly point of the volatility index series
    async fn from_index_data(&self, currency: &str) -> Result<Option<f64>> {
        let url = format!("{}/public/get_volatility_index_data", self.base_url);
        let end = Utc::now().timestamp_millis();
        let start = end - 3_600_000;
        let response: RpcResponse = send_json(
            ApiName::Deribit,
            Endpoint::Read,
            self.client.get(&url).query(&[
                ("currency", currency.to_string()),
                ("resolution", "60".to_string()),
                ("start_timestamp", start.to_string()),
                ("end_timestamp", end.to_string()),
            ]),
        )
        .await?;
        Ok(response.result.as_ref().and_then(latest_point).map(normalize_dvol))
    }
}

#[async_trait]
impl VolatilityIndexSource for DeribitClient {
    fn api(&self) -> ApiName {
        ApiName::Deribit
    }

    async fn volatility_index(&self, asset: Asset) -> Result<f64> {
        let currency = asset
            .dvol_currency()
            .ok_or_else(|| Error::DataUnavailable(format!("no DVOL index for {asset}")))?;

        if let Some(dvol) = self.from_index(currency).await? {
            return Ok(dvol);
        }
        self.from_index_data(currency)
            .await?
            .ok_or_else(|| Error::DataUnavailable(format!("deribit returned no DVOL for {currency}")))
    }
}

/// Points are `[timestamp, open, high, low, close]`; use the latest close
fn latest_point(result: &Value) -> Option<f64> {
    let point = result.get("data")?.as_array()?.last()?.as_array()?;
    point.last()?.as_f64()
}

/// DVOL is quoted in percent; values already below 2 are taken as decimals
fn normalize_dvol(value: f64) -> f64 {
    if value > 2.0 {
        value / 100.0
    } else {
        value
    }
}
