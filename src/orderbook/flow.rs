//! Order book imbalance (OBI) and the probability nudge derived from it

use super::{OrderBook, PriceLevel};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const BULLISH_THRESHOLD: f64 = 0.30;
const BEARISH_THRESHOLD: f64 = -0.30;
const HIGH_CONFIDENCE: f64 = 0.50;
const MIN_PROBABILITY: f64 = 0.01;
const MAX_PROBABILITY: f64 = 0.99;
/// Half-width around 0.50 counted as at-the-money liquidity
const ATM_BAND: f64 = 0.03;

/// Direction of order book pressure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowDirection {
    Bullish,
    Bearish,
    Neutral,
    NoData,
}

/// Confidence of a flow signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowConfidence {
    None,
    Low,
    Medium,
    High,
}

/// Imbalance reading for one book
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowSignal {
    /// Imbalance in [-1, 1]
    pub obi: f64,
    pub direction: FlowDirection,
    pub confidence: FlowConfidence,
    pub bid_volume: f64,
    pub ask_volume: f64,
    /// Additive probability adjustment
    pub prob_adjustment: f64,
}

impl FlowSignal {
    fn no_data() -> Self {
        Self {
            obi: 0.0,
            direction: FlowDirection::NoData,
            confidence: FlowConfidence::None,
            bid_volume: 0.0,
            ask_volume: 0.0,
            prob_adjustment: 0.0,
        }
    }

    /// Whether the signal is strong enough to count as agreement
    pub fn is_actionable(&self) -> bool {
        self.confidence >= FlowConfidence::Medium
    }
}

/// How concentrated resting liquidity is around the 50c strike-uncertainty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiquiditySignal {
    HighUncertainty,
    ModerateUncertainty,
    LowUncertainty,
    NoData,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityClustering {
    /// Share of volume priced within the ATM band
    pub atm_concentration: f64,
    pub atm_volume: f64,
    pub otm_volume: f64,
    pub signal: LiquiditySignal,
}

/// Order flow analyzer
#[derive(Debug, Clone, Copy)]
pub struct OrderFlowAnalyzer {
    /// Probability shift per unit of OBI
    scale: f64,
    /// Levels considered by the depth-weighted imbalance
    depth_levels: usize,
}

impl Default for OrderFlowAnalyzer {
    fn default() -> Self {
        Self::new(0.2, 5)
    }
}

impl OrderFlowAnalyzer {
    pub fn new(scale: f64, depth_levels: usize) -> Self {
        Self {
            scale,
            depth_levels: depth_levels.max(1),
        }
    }

    /// Imbalance over every yes level
    pub fn imbalance(&self, book: &OrderBook) -> FlowSignal {
        self.signal(total(&book.yes_bids), total(&book.yes_asks))
    }

    /// Imbalance over the top `depth_levels` levels, best level weighted most
    pub fn depth_weighted_imbalance(&self, book: &OrderBook) -> FlowSignal {
        self.signal(
            self.weighted(&book.yes_bids),
            self.weighted(&book.yes_asks),
        )
    }

    fn weighted(&self, levels: &[PriceLevel]) -> f64 {
        levels
            .iter()
            .take(self.depth_levels)
            .enumerate()
            .map(|(i, l)| to_f64(l.size) * (self.depth_levels - i) as f64)
            .sum()
    }

    fn signal(&self, bid_volume: f64, ask_volume: f64) -> FlowSignal {
        let total = bid_volume + ask_volume;
        if total <= 0.0 {
            return FlowSignal::no_data();
        }
        let obi = (bid_volume - ask_volume) / total;
        let (direction, confidence) = if obi >= BULLISH_THRESHOLD {
            (FlowDirection::Bullish, strength(obi))
        } else if obi <= BEARISH_THRESHOLD {
            (FlowDirection::Bearish, strength(obi))
        } else {
            (FlowDirection::Neutral, FlowConfidence::Low)
        };
        FlowSignal {
            obi,
            direction,
            confidence,
            bid_volume,
            ask_volume,
            prob_adjustment: obi * self.scale,
        }
    }

    /// Apply the flow nudge to a model probability, clamped to [0.01, 0.99]
    pub fn adjust_probability(&self, base: f64, signal: &FlowSignal) -> f64 {
        (base + signal.prob_adjustment).clamp(MIN_PROBABILITY, MAX_PROBABILITY)
    }

    /// Share of yes-side liquidity resting near 50c
    pub fn liquidity_clustering(&self, book: &OrderBook) -> LiquidityClustering {
        let (mut atm, mut otm) = (0.0, 0.0);
        for level in book.yes_bids.iter().chain(book.yes_asks.iter()) {
            let size = to_f64(level.size);
            if (to_f64(level.price) - 0.5).abs() < ATM_BAND {
                atm += size;
            } else {
                otm += size;
            }
        }
        let total = atm + otm;
        if total <= 0.0 {
            return LiquidityClustering {
                atm_concentration: 0.0,
                atm_volume: 0.0,
                otm_volume: 0.0,
                signal: LiquiditySignal::NoData,
            };
        }
        let atm_concentration = atm / total;
        let signal = if atm_concentration > 0.6 {
            LiquiditySignal::HighUncertainty
        } else if atm_concentration > 0.4 {
            LiquiditySignal::ModerateUncertainty
        } else {
            LiquiditySignal::LowUncertainty
        };
        LiquidityClustering {
            atm_concentration,
            atm_volume: atm,
            otm_volume: otm,
            signal,
        }
    }
}

fn strength(obi: f64) -> FlowConfidence {
    if obi.abs() >= HIGH_CONFIDENCE {
        FlowConfidence::High
    } else {
        FlowConfidence::Medium
    }
}

fn total(levels: &[PriceLevel]) -> f64 {
    levels.iter().map(|l| to_f64(l.size)).sum()
}

fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(yes: &[[i64; 2]], no: &[[i64; 2]]) -> OrderBook {
        OrderBook::from_bid_levels("T", yes, no)
    }

    #[test]
    fn test_empty_book_no_data() {
        let analyzer = OrderFlowAnalyzer::default();
        let signal = analyzer.imbalance(&OrderBook::new("T"));
        assert_eq!(signal.direction, FlowDirection::NoData);
        assert_eq!(signal.confidence, FlowConfidence::None);
        assert_eq!(signal.prob_adjustment, 0.0);
        assert_eq!(analyzer.adjust_probability(0.42, &signal), 0.42);
    }

    #[test]
    fn test_bullish_high_confidence() {
        let analyzer = OrderFlowAnalyzer::default();
        // 300 bid vs 100 ask → OBI 0.5
        let signal = analyzer.imbalance(&book(&[[40, 300]], &[[55, 100]]));
        assert!((signal.obi - 0.5).abs() < 1e-12);
        assert_eq!(signal.direction, FlowDirection::Bullish);
        assert_eq!(signal.confidence, FlowConfidence::High);
        assert!((signal.prob_adjustment - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_bearish_medium_and_neutral_low() {
        let analyzer = OrderFlowAnalyzer::default();
        // 60 vs 140 → OBI -0.4
        let bearish = analyzer.imbalance(&book(&[[40, 60]], &[[55, 140]]));
        assert_eq!(bearish.direction, FlowDirection::Bearish);
        assert_eq!(bearish.confidence, FlowConfidence::Medium);

        let neutral = analyzer.imbalance(&book(&[[40, 110]], &[[55, 90]]));
        assert_eq!(neutral.direction, FlowDirection::Neutral);
        assert_eq!(neutral.confidence, FlowConfidence::Low);
        assert!(!neutral.is_actionable());
    }

    #[test]
    fn test_adjustment_clamped() {
        let analyzer = OrderFlowAnalyzer::default();
        let signal = analyzer.imbalance(&book(&[[40, 100]], &[]));
        assert_eq!(signal.obi, 1.0);
        assert_eq!(analyzer.adjust_probability(0.95, &signal), 0.99);

        let signal = analyzer.imbalance(&book(&[], &[[60, 100]]));
        assert_eq!(analyzer.adjust_probability(0.05, &signal), 0.01);
    }

    #[test]
    fn test_depth_weighting_favors_top_of_book() {
        let analyzer = OrderFlowAnalyzer::new(0.2, 5);
        // Equal raw volume, but the bid side is concentrated at the top
        let b = book(&[[45, 100], [40, 10]], &[[54, 10], [50, 100]]);
        assert!(analyzer.imbalance(&b).obi.abs() < 1e-12);
        let weighted = analyzer.depth_weighted_imbalance(&b);
        // bids 100*5 + 10*4 = 540; asks 10*5 + 100*4 = 450
        assert!((weighted.obi - 90.0 / 990.0).abs() < 1e-12);
    }

    #[test]
    fn test_liquidity_clustering() {
        let analyzer = OrderFlowAnalyzer::default();
        let clustered = analyzer.liquidity_clustering(&book(&[[49, 80]], &[[49, 80], [20, 20]]));
        assert_eq!(clustered.signal, LiquiditySignal::HighUncertainty);

        let spread_out = analyzer.liquidity_clustering(&book(&[[10, 80]], &[[15, 80]]));
        assert_eq!(spread_out.signal, LiquiditySignal::LowUncertainty);

        let empty = analyzer.liquidity_clustering(&OrderBook::new("T"));
        assert_eq!(empty.signal, LiquiditySignal::NoData);
    }
}
