//! Market discovery module
//!
//! Lists an asset's short-dated binary contracts, picks the live expiry group
//! and turns each contract into a ranked signal

mod service;
pub mod stream;
mod ticker;

pub use service::{MarketAnalysis, ServiceConfig, SignalService, CANDLE_INTERVAL};
pub use ticker::parse_strike;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Statuses that mean a contract no longer trades
const CLOSED_STATUSES: [&str; 3] = ["finalized", "settled", "closed"];

/// A binary contract with its top-of-book quotes, prices in dollars (0..1)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractQuote {
    pub ticker: String,
    pub title: String,
    /// Strike in USD
    pub strike: f64,
    /// Settlement time
    pub expiry: DateTime<Utc>,
    pub yes_bid: Option<Decimal>,
    pub yes_ask: Option<Decimal>,
    pub no_bid: Option<Decimal>,
    pub no_ask: Option<Decimal>,
    /// Exchange status as listed
    pub status: String,
}

impl ContractQuote {
    pub fn yes_mid(&self) -> Option<Decimal> {
        mid(self.yes_bid, self.yes_ask)
    }

    pub fn no_mid(&self) -> Option<Decimal> {
        mid(self.no_bid, self.no_ask)
    }

    /// Market-implied probability of YES, 0.5 when the yes book is one-sided
    pub fn implied_probability(&self) -> f64 {
        self.yes_mid().and_then(|m| m.to_f64()).unwrap_or(0.5)
    }

    pub fn hours_to_expiry(&self, now: DateTime<Utc>) -> f64 {
        (self.expiry - now).num_milliseconds() as f64 / 3_600_000.0
    }

    /// Still listed as trading and not yet expired
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        let status = self.status.to_ascii_lowercase();
        !CLOSED_STATUSES.contains(&status.as_str()) && self.expiry > now
    }
}

fn mid(bid: Option<Decimal>, ask: Option<Decimal>) -> Option<Decimal> {
    match (bid, ask) {
        (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
        _ => None,
    }
}

/// Contracts sharing the earliest live expiry, in listing order
pub fn earliest_expiry_group(quotes: Vec<ContractQuote>, now: DateTime<Utc>) -> Vec<ContractQuote> {
    let live: Vec<_> = quotes.into_iter().filter(|q| q.is_live(now)).collect();
    let Some(earliest) = live.iter().map(|q| q.expiry).min() else {
        return vec![];
    };
    live.into_iter().filter(|q| q.expiry == earliest).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn quote(ticker: &str, expiry: DateTime<Utc>, status: &str) -> ContractQuote {
        ContractQuote {
            ticker: ticker.to_string(),
            title: String::new(),
            strike: 100_000.0,
            expiry,
            yes_bid: Some(dec!(0.40)),
            yes_ask: Some(dec!(0.44)),
            no_bid: Some(dec!(0.56)),
            no_ask: Some(dec!(0.60)),
            status: status.to_string(),
        }
    }

    #[test]
    fn test_implied_probability_is_yes_mid() {
        let now = Utc::now();
        let mut q = quote("A", now + Duration::hours(1), "active");
        assert!((q.implied_probability() - 0.42).abs() < 1e-12);
        q.yes_ask = None;
        assert_eq!(q.implied_probability(), 0.5);
    }

    #[test]
    fn test_earliest_expiry_group_skips_closed_and_expired() {
        let now = Utc::now();
        let soon = now + Duration::minutes(30);
        let later = now + Duration::hours(2);
        let quotes = vec![
            quote("expired", now - Duration::minutes(5), "active"),
            quote("settled", now + Duration::minutes(10), "Settled"),
            quote("later", later, "active"),
            quote("soon-a", soon, "active"),
            quote("soon-b", soon, "open"),
        ];
        let group = earliest_expiry_group(quotes, now);
        let tickers: Vec<_> = group.iter().map(|q| q.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["soon-a", "soon-b"]);
    }

    #[test]
    fn test_hours_to_expiry() {
        let now = Utc::now();
        let q = quote("A", now + Duration::minutes(90), "active");
        assert!((q.hours_to_expiry(now) - 1.5).abs() < 1e-9);
    }
}
