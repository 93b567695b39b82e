//! Price feed module
//!
//! Spot prices and hourly candles from Coinbase, Binance and Kraken, plus
//! the Deribit DVOL implied-volatility index

mod binance;
mod coinbase;
mod deribit;
mod kraken;
mod types;

pub use binance::{BinanceClient, BINANCE_API_URL};
pub use coinbase::{CoinbaseClient, COINBASE_API_URL};
pub use deribit::{DeribitClient, DERIBIT_API_URL};
pub use kraken::{KrakenClient, KRAKEN_API_URL};
pub use types::{Asset, Candle};

use crate::error::Result;
use crate::resilience::ApiName;
use async_trait::async_trait;

/// Exchange that can quote a spot price and hourly candles
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// API this source calls, for limiter and breaker selection
    fn api(&self) -> ApiName;
    /// Current spot price in USD
    async fn spot_price(&self, asset: Asset) -> Result<f64>;
    /// Requests `historical_candles` makes for `hours`, charged to the
    /// rate limiter
    fn candle_requests(&self, _hours: usize) -> usize {
        1
    }
    /// The last `hours` hourly candles, oldest first
    async fn historical_candles(&self, asset: Asset, hours: usize) -> Result<Vec<Candle>>;
}

impl std::fmt::Display for dyn PriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.api())
    }
}

/// Implied-volatility index feed
#[async_trait]
pub trait VolatilityIndexSource: Send + Sync {
    fn api(&self) -> ApiName;
    /// Annualized implied volatility as a decimal (0.68 = 68%).
    ///
    /// `DataUnavailable` when the asset has no index or the feed is empty.
    async fn volatility_index(&self, asset: Asset) -> Result<f64>;
}

/// Sort ascending by time and drop bars with non-positive prices
pub(crate) fn normalize_candles(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.retain(|c| c.open > 0.0 && c.high > 0.0 && c.low > 0.0 && c.close > 0.0);
    candles.sort_by_key(|c| c.timestamp);
    candles.dedup_by_key(|c| c.timestamp);
    candles
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(ts: i64, close: f64) -> Candle {
        Candle {
            timestamp: Utc.timestamp_opt(ts, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn test_normalize_orders_and_filters() {
        let candles = normalize_candles(vec![bar(7200, 3.0), bar(0, 1.0), bar(3600, 0.0), bar(0, 1.0)]);
        let times: Vec<i64> = candles.iter().map(|c| c.timestamp.timestamp()).collect();
        assert_eq!(times, vec![0, 7200]);
    }
}
