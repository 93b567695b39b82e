//! Price feed types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One OHLCV bar. Series are ordered oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Underlying assets with listed binary contracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    Btc,
    Eth,
    Xrp,
}

impl Asset {
    pub const ALL: [Asset; 3] = [Asset::Btc, Asset::Eth, Asset::Xrp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Asset::Btc => "BTC",
            Asset::Eth => "ETH",
            Asset::Xrp => "XRP",
        }
    }

    /// Series ticker of the daily above/below contracts
    pub fn series_ticker(&self) -> &'static str {
        match self {
            Asset::Btc => "KXBTCD",
            Asset::Eth => "KXETHD",
            Asset::Xrp => "KXXRPD",
        }
    }

    pub fn coinbase_product(&self) -> &'static str {
        match self {
            Asset::Btc => "BTC-USD",
            Asset::Eth => "ETH-USD",
            Asset::Xrp => "XRP-USD",
        }
    }

    pub fn binance_symbol(&self) -> &'static str {
        match self {
            Asset::Btc => "BTCUSDT",
            Asset::Eth => "ETHUSDT",
            Asset::Xrp => "XRPUSDT",
        }
    }

    pub fn kraken_pair(&self) -> &'static str {
        match self {
            Asset::Btc => "XBTUSD",
            Asset::Eth => "ETHUSD",
            Asset::Xrp => "XRPUSD",
        }
    }

    /// Deribit currency carrying a DVOL index, if any
    pub fn dvol_currency(&self) -> Option<&'static str> {
        match self {
            Asset::Btc => Some("BTC"),
            Asset::Eth => Some("ETH"),
            Asset::Xrp => None,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Asset {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BTC" | "BITCOIN" => Ok(Asset::Btc),
            "ETH" | "ETHEREUM" => Ok(Asset::Eth),
            "XRP" | "RIPPLE" => Ok(Asset::Xrp),
            other => Err(crate::error::Error::DataUnavailable(format!(
                "unsupported asset {other}"
            ))),
        }
    }
}
