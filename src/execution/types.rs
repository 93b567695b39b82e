//! Execution types

use crate::kalshi::OrderType;
use crate::signal::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trade identifier
pub type TradeId = Uuid;

/// Lifecycle of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    /// Recorded, order not yet confirmed or nothing filled
    Pending,
    /// Some contracts filled
    Partial,
    /// Fully filled
    Open,
    /// Position sold
    Closed,
    /// Failed before any fill
    Cancelled,
}

impl TradeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TradeStatus::Closed | TradeStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Pending => "PENDING",
            TradeStatus::Partial => "PARTIAL",
            TradeStatus::Open => "OPEN",
            TradeStatus::Closed => "CLOSED",
            TradeStatus::Cancelled => "CANCELLED",
        }
    }

    /// Status after an order acknowledgement
    pub fn from_fill(filled: u32, requested: u32) -> Self {
        if filled >= requested && requested > 0 {
            TradeStatus::Open
        } else if filled > 0 {
            TradeStatus::Partial
        } else {
            TradeStatus::Pending
        }
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trade record. Prices are dollars per contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub ticker: String,
    pub direction: Side,
    pub strike: f64,
    /// Contracts requested
    pub contracts: u32,
    pub filled_contracts: u32,
    /// Idempotency key sent with the entry order
    pub client_order_id: String,
    pub order_id: Option<String>,
    pub status: TradeStatus,
    pub entry_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub fees: Decimal,
    pub pnl: Option<Decimal>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Upstream message of the failure that cancelled the trade
    pub error: Option<String>,
}

impl Trade {
    pub fn pending(request: &TradeRequest, client_order_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticker: request.ticker.clone(),
            direction: request.direction,
            strike: request.strike,
            contracts: request.contracts,
            filled_contracts: 0,
            client_order_id,
            order_id: None,
            status: TradeStatus::Pending,
            entry_price: None,
            exit_price: None,
            fees: Decimal::ZERO,
            pnl: None,
            opened_at: Utc::now(),
            closed_at: None,
            error: None,
        }
    }
}

/// Request to open a position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRequest {
    pub ticker: String,
    pub direction: Side,
    pub strike: f64,
    pub contracts: u32,
    #[serde(default)]
    pub order_type: OrderType,
    /// Limit price in cents for limit orders
    #[serde(default)]
    pub limit_price_cents: Option<u32>,
}

/// Structured outcome of a trading operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeResponse {
    pub success: bool,
    pub trade_id: Option<TradeId>,
    pub order_id: Option<String>,
    pub client_order_id: Option<String>,
    pub status: Option<TradeStatus>,
    pub filled: u32,
    /// Fill price in dollars
    pub price: Option<Decimal>,
    /// Entry cost, for opening trades
    pub cost: Option<Decimal>,
    /// Realized P&L, for closing trades
    pub pnl: Option<Decimal>,
    pub error: Option<String>,
}

impl TradeResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub(crate) fn failed_trade(trade: &Trade, error: impl Into<String>) -> Self {
        Self {
            trade_id: Some(trade.id),
            client_order_id: Some(trade.client_order_id.clone()),
            status: Some(trade.status),
            ..Self::failure(error)
        }
    }
}

/// Open position with live mark
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub trade_id: TradeId,
    pub ticker: String,
    pub direction: Side,
    pub strike: f64,
    pub contracts: u32,
    pub entry_price: Option<Decimal>,
    /// Best bid on the held side, `None` when the book could not be fetched
    pub current_price: Option<Decimal>,
    /// After fees on a gain
    pub unrealized_pnl: Option<Decimal>,
    pub status: TradeStatus,
    pub opened_at: DateTime<Utc>,
}

/// Realized P&L over closed trades
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnlSummary {
    pub since: DateTime<Utc>,
    pub total_pnl: Decimal,
    pub total_fees: Decimal,
    pub trade_count: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
}
