//! Execution engine module
//!
//! Trade lifecycle, persistence and the paper exchange used in paper mode

mod executor;
mod paper;
mod store;
mod types;

pub use executor::{ExecutorConfig, TradeExecutor};
pub use paper::PaperExchange;
pub use store::{InMemoryTradeStore, TradeStore};
pub use types::{PnlSummary, Position, Trade, TradeId, TradeRequest, TradeResponse, TradeStatus};

use serde::{Deserialize, Serialize};

/// Where orders are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// In-process paper exchange
    #[default]
    Paper,
    /// Live exchange API
    Live,
}
