//! Mispricing engine
//!
//! Turns a contract quote plus spot and volatility into a fee-aware expected
//! value for each side, a mispricing classification and a confidence score.

use super::{MispricingClass, Signal, TradeAction};
use crate::market::ContractQuote;
use crate::model::{BinaryOptionPricer, ProbabilityModel};
use crate::orderbook::{FlowDirection, FlowSignal, OrderFlowAnalyzer};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Engine parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fee charged on positive gross profit
    pub fee_rate: f64,
    /// Minimum EV for a side to be recommended
    pub ev_threshold: f64,
    /// |mispricing| above which a contract is classified as mispriced
    pub mispricing_threshold: f64,
    /// Signals kept after ranking
    pub top_n: usize,
    pub max_confidence: f64,
    /// Confidence added when order flow agrees with the chosen side
    pub flow_boost: f64,
    /// Allowed |yes_mid + no_mid - 1| before a book is flagged inconsistent
    pub consistency_tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fee_rate: 0.07,
            ev_threshold: 0.02,
            mispricing_threshold: 0.10,
            top_n: 10,
            max_confidence: 0.95,
            flow_boost: 0.05,
            consistency_tolerance: 0.05,
        }
    }
}

/// Mispricing engine
pub struct MispricingEngine {
    config: EngineConfig,
    model: Box<dyn ProbabilityModel>,
    flow: OrderFlowAnalyzer,
}

impl MispricingEngine {
    pub fn new(config: EngineConfig, flow: OrderFlowAnalyzer) -> Self {
        Self::with_model(config, flow, Box::new(BinaryOptionPricer))
    }

    pub fn with_model(
        config: EngineConfig,
        flow: OrderFlowAnalyzer,
        model: Box<dyn ProbabilityModel>,
    ) -> Self {
        Self {
            config,
            model,
            flow,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn flow_analyzer(&self) -> &OrderFlowAnalyzer {
        &self.flow
    }

    /// Expected value per contract of buying at `entry` with win probability
    /// `p`. The fee applies only to a positive gross profit. `None` when there
    /// is no usable entry price.
    pub fn expected_value(p: f64, entry: f64, fee_rate: f64) -> Option<f64> {
        if !(entry > 0.0 && entry < 1.0) {
            return None;
        }
        let gross = 1.0 - entry;
        let fee = fee_rate * gross.max(0.0);
        Some(p * (gross - fee) - (1.0 - p) * entry)
    }

    pub fn classify(&self, mispricing: f64) -> MispricingClass {
        if mispricing > self.config.mispricing_threshold {
            MispricingClass::KalshiUnderpriced
        } else if mispricing < -self.config.mispricing_threshold {
            MispricingClass::KalshiOverpriced
        } else {
            MispricingClass::FairPriced
        }
    }

    /// Pick the side whose EV clears the threshold and strictly beats the other
    pub fn choose_action(&self, ev_yes: Option<f64>, ev_no: Option<f64>) -> (TradeAction, f64) {
        let yes = ev_yes.unwrap_or(f64::NEG_INFINITY);
        let no = ev_no.unwrap_or(f64::NEG_INFINITY);
        if yes > self.config.ev_threshold && yes > no {
            (TradeAction::BuyYes, yes)
        } else if no > self.config.ev_threshold && no > yes {
            (TradeAction::BuyNo, no)
        } else {
            let best = yes.max(no);
            (TradeAction::Hold, if best.is_finite() { best } else { 0.0 })
        }
    }

    pub fn confidence(&self, mispricing: f64, action: TradeAction, flow: Option<&FlowSignal>) -> f64 {
        let base = (0.5 + 2.0 * mispricing.abs()).min(self.config.max_confidence);
        let agrees = flow.is_some_and(|f| {
            f.is_actionable()
                && matches!(
                    (action, f.direction),
                    (TradeAction::BuyYes, FlowDirection::Bullish)
                        | (TradeAction::BuyNo, FlowDirection::Bearish)
                )
        });
        if agrees {
            (base + self.config.flow_boost).min(self.config.max_confidence)
        } else {
            base
        }
    }

    /// Evaluate one contract. `flow` is the imbalance read from its book, when fetched.
    pub fn evaluate(
        &self,
        quote: &ContractQuote,
        spot: f64,
        volatility: f64,
        flow: Option<FlowSignal>,
        now: DateTime<Utc>,
    ) -> Signal {
        let hours = quote.hours_to_expiry(now).max(0.0);
        let theoretical = self
            .model
            .probability_above(spot, quote.strike, hours, volatility);
        let probability = flow
            .as_ref()
            .map(|f| self.flow.adjust_probability(theoretical, f))
            .unwrap_or(theoretical);

        let yes_entry = quote.yes_ask.and_then(|d| d.to_f64());
        let no_entry = quote.yes_bid.and_then(|d| d.to_f64()).map(|bid| 1.0 - bid);
        let ev_yes = yes_entry.and_then(|a| Self::expected_value(probability, a, self.config.fee_rate));
        let ev_no = no_entry.and_then(|a| Self::expected_value(1.0 - probability, a, self.config.fee_rate));
        let (action, expected_value) = self.choose_action(ev_yes, ev_no);

        let implied = quote.implied_probability();
        let mispricing = probability - implied;
        let confidence = self.confidence(mispricing, action, flow.as_ref());

        let book_consistent = self.book_consistent(quote);
        if !book_consistent {
            warn!(
                ticker = %quote.ticker,
                yes_mid = ?quote.yes_mid(),
                no_mid = ?quote.no_mid(),
                "Yes and no quotes disagree"
            );
        }

        debug!(
            ticker = %quote.ticker,
            theoretical,
            probability,
            implied,
            ev = expected_value,
            action = ?action,
            "Contract evaluated"
        );

        Signal {
            ticker: quote.ticker.clone(),
            strike: quote.strike,
            expiry: quote.expiry,
            hours_to_expiry: hours,
            spot,
            volatility,
            theoretical_probability: theoretical,
            model_probability: probability,
            implied_probability: implied,
            mispricing,
            classification: self.classify(mispricing),
            expected_value_yes: ev_yes,
            expected_value_no: ev_no,
            expected_value,
            action,
            confidence,
            yes_entry,
            no_entry,
            order_flow: flow,
            book_consistent,
            generated_at: now,
        }
    }

    fn book_consistent(&self, quote: &ContractQuote) -> bool {
        match (quote.yes_mid(), quote.no_mid()) {
            (Some(yes), Some(no)) => (yes + no - rust_decimal::Decimal::ONE)
                .abs()
                .to_f64()
                .is_some_and(|gap| gap <= self.config.consistency_tolerance),
            _ => true,
        }
    }

    /// Sort by EV descending and keep the top N
    pub fn rank(&self, mut signals: Vec<Signal>) -> Vec<Signal> {
        signals.sort_by(|a, b| b.expected_value.total_cmp(&a.expected_value));
        signals.truncate(self.config.top_n);
        signals
    }
}

impl Default for MispricingEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default(), OrderFlowAnalyzer::default())
    }
}
