//! Signal types

use crate::orderbook::FlowSignal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trading side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy Yes contracts
    Yes,
    /// Buy No contracts
    No,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Yes => "yes",
            Side::No => "no",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recommended action for a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    BuyYes,
    BuyNo,
    Hold,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::BuyYes => "buy_yes",
            TradeAction::BuyNo => "buy_no",
            TradeAction::Hold => "hold",
        }
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            TradeAction::BuyYes => Some(Side::Yes),
            TradeAction::BuyNo => Some(Side::No),
            TradeAction::Hold => None,
        }
    }
}

/// How the exchange prices YES relative to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MispricingClass {
    /// Model probability well above the market's, buy YES
    KalshiUnderpriced,
    /// Model probability well below the market's, buy NO
    KalshiOverpriced,
    FairPriced,
}

/// Evaluation of one contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub ticker: String,
    pub strike: f64,
    pub expiry: DateTime<Utc>,
    pub hours_to_expiry: f64,
    pub spot: f64,
    /// Volatility fed to the pricer
    pub volatility: f64,
    /// Pricer output before any flow adjustment
    pub theoretical_probability: f64,
    /// Probability after the order flow nudge, used for EV
    pub model_probability: f64,
    /// Market-implied YES probability (yes mid)
    pub implied_probability: f64,
    /// `model_probability - implied_probability`
    pub mispricing: f64,
    pub classification: MispricingClass,
    /// `None` when there is no yes ask to buy at
    pub expected_value_yes: Option<f64>,
    /// `None` when there is no yes bid to derive the no entry from
    pub expected_value_no: Option<f64>,
    /// EV of the chosen side, or the better side for a hold
    pub expected_value: f64,
    pub action: TradeAction,
    pub confidence: f64,
    /// Entry price for a YES buy, in dollars
    pub yes_entry: Option<f64>,
    /// Entry price for a NO buy, in dollars
    pub no_entry: Option<f64>,
    pub order_flow: Option<FlowSignal>,
    /// Yes and no books agree on price to within tolerance
    pub book_consistent: bool,
    pub generated_at: DateTime<Utc>,
}

impl Signal {
    /// Chosen side, `None` for a hold
    pub fn side(&self) -> Option<Side> {
        self.action.side()
    }

    /// Entry price for the chosen side
    pub fn entry_price(&self) -> Option<f64> {
        match self.side()? {
            Side::Yes => self.yes_entry,
            Side::No => self.no_entry,
        }
    }
}
