//! Binary contract exchange module
//!
//! Market listing, order books and order entry. [`KalshiClient`] talks to the
//! live REST API; [`crate::execution::PaperExchange`] implements the same
//! traits in process.

mod client;

pub use client::{KalshiClient, RequestSigner, KALSHI_API_URL, KALSHI_DEMO_API_URL};

use crate::error::Result;
use crate::market::{parse_strike, ContractQuote};
use crate::orderbook::OrderBook;
use crate::signal::Side;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A contract as listed by the exchange, prices in cents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListedMarket {
    pub ticker: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub close_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expiration_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub yes_bid: Option<i64>,
    #[serde(default)]
    pub yes_ask: Option<i64>,
    #[serde(default)]
    pub no_bid: Option<i64>,
    #[serde(default)]
    pub no_ask: Option<i64>,
}

impl ListedMarket {
    /// Convert to a quote. `None` when no strike or expiry can be read.
    pub fn into_quote(self) -> Option<ContractQuote> {
        let strike = parse_strike(&self.ticker, &self.title)?;
        let expiry = self.close_time.or(self.expiration_time)?;
        Some(ContractQuote {
            strike,
            expiry,
            yes_bid: cents(self.yes_bid),
            yes_ask: cents(self.yes_ask),
            no_bid: cents(self.no_bid),
            no_ask: cents(self.no_ask),
            ticker: self.ticker,
            title: self.title,
            status: self.status,
        })
    }
}

/// A zero or out-of-range quote means no price on that side
fn cents(value: Option<i64>) -> Option<Decimal> {
    value
        .filter(|c| (1..=99).contains(c))
        .map(|c| Decimal::new(c, 2))
}

/// One page of a paginated listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketsPage {
    #[serde(default)]
    pub markets: Vec<ListedMarket>,
    /// Next page cursor, empty or absent on the last page
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Read side of the exchange
#[async_trait]
pub trait MarketApi: Send + Sync {
    /// One page of a series' contracts
    async fn markets_page(&self, series: &str, cursor: Option<&str>) -> Result<MarketsPage>;
    /// Current book for a contract
    async fn orderbook(&self, ticker: &str) -> Result<OrderBook>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderAction {
    Buy,
    Sell,
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Fill at the best available price
    #[default]
    Market,
    /// Fill only at the limit or better
    Limit,
}

/// Order to submit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub ticker: String,
    pub side: Side,
    pub action: OrderAction,
    pub count: u32,
    pub order_type: OrderType,
    /// Limit price in cents, for limit orders
    pub limit_price_cents: Option<u32>,
    /// Idempotency key; the exchange treats a repeat as the same order
    pub client_order_id: String,
}

/// Exchange acknowledgement of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub client_order_id: String,
    pub filled_count: u32,
    /// Average fill price in cents
    pub avg_price_cents: Option<Decimal>,
    pub status: String,
}

/// Account balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub balance_cents: i64,
}

/// Order entry side of the exchange
#[async_trait]
pub trait OrderApi: Send + Sync {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck>;
    async fn cancel_order(&self, order_id: &str) -> Result<()>;
    async fn balance(&self) -> Result<Balance>;
}
