//! Binary contract order book

use super::PriceLevel;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Yes/No order book for one contract. Prices are in dollars (0..1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    /// Contract ticker
    pub ticker: String,
    /// Yes bids, best (highest) first
    pub yes_bids: Vec<PriceLevel>,
    /// Yes asks, best (lowest) first
    pub yes_asks: Vec<PriceLevel>,
    /// No bids, best (highest) first
    pub no_bids: Vec<PriceLevel>,
    /// No asks, best (lowest) first
    pub no_asks: Vec<PriceLevel>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl OrderBook {
    /// Create a new empty order book
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            yes_bids: vec![],
            yes_asks: vec![],
            no_bids: vec![],
            no_asks: vec![],
            updated_at: Utc::now(),
        }
    }

    /// Build from resting bids on each side as `[price_cents, quantity]`.
    ///
    /// A no bid at `p` is a yes ask at `100 - p` and vice versa.
    pub fn from_bid_levels(ticker: impl Into<String>, yes: &[[i64; 2]], no: &[[i64; 2]]) -> Self {
        let mut book = Self::new(ticker);
        book.yes_bids = to_levels(yes, false);
        book.no_bids = to_levels(no, false);
        book.yes_asks = to_levels(no, true);
        book.no_asks = to_levels(yes, true);
        book.sort();
        book
    }

    fn sort(&mut self) {
        self.yes_bids.sort_by(|a, b| b.price.cmp(&a.price));
        self.no_bids.sort_by(|a, b| b.price.cmp(&a.price));
        self.yes_asks.sort_by(|a, b| a.price.cmp(&b.price));
        self.no_asks.sort_by(|a, b| a.price.cmp(&b.price));
    }

    pub fn best_yes_bid(&self) -> Option<Decimal> {
        self.yes_bids.first().map(|l| l.price)
    }

    pub fn best_yes_ask(&self) -> Option<Decimal> {
        self.yes_asks.first().map(|l| l.price)
    }

    pub fn best_no_bid(&self) -> Option<Decimal> {
        self.no_bids.first().map(|l| l.price)
    }

    pub fn best_no_ask(&self) -> Option<Decimal> {
        self.no_asks.first().map(|l| l.price)
    }

    /// Yes mid price
    pub fn yes_mid(&self) -> Option<Decimal> {
        match (self.best_yes_bid(), self.best_yes_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// Yes spread
    pub fn yes_spread(&self) -> Option<Decimal> {
        match (self.best_yes_bid(), self.best_yes_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.yes_bids.is_empty() && self.yes_asks.is_empty()
    }
}

fn to_levels(raw: &[[i64; 2]], complement: bool) -> Vec<PriceLevel> {
    raw.iter()
        .filter(|[price, qty]| (1..=99).contains(price) && *qty > 0)
        .map(|&[price, qty]| {
            let cents = if complement { 100 - price } else { price };
            PriceLevel {
                price: Decimal::new(cents, 2),
                size: Decimal::from(qty),
            }
        })
        .collect()
}
