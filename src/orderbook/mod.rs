//! Order book module
//!
//! Binary contract books and the order flow analysis run over them

mod book;
mod flow;

pub use book::OrderBook;
pub use flow::{
    FlowConfidence, FlowDirection, FlowSignal, LiquidityClustering, LiquiditySignal,
    OrderFlowAnalyzer,
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price level in the order book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price at this level
    pub price: Decimal,
    /// Total size available
    pub size: Decimal,
}
