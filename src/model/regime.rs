//! Volatility regime and risk premium

use serde::{Deserialize, Serialize};

/// Market volatility regime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityRegime {
    Calm,
    Normal,
    Elevated,
    Crisis,
}

/// (regime, realized ceiling, implied ceiling), checked in order
const REGIME_CEILINGS: [(VolatilityRegime, f64, f64); 3] = [
    (VolatilityRegime::Calm, 0.30, 0.40),
    (VolatilityRegime::Normal, 0.50, 0.60),
    (VolatilityRegime::Elevated, 0.75, 0.90),
];

impl VolatilityRegime {
    /// First regime whose realized and implied ceilings both hold
    pub fn classify(realized: f64, implied: f64) -> Self {
        REGIME_CEILINGS
            .iter()
            .find(|(_, rv, iv)| realized <= *rv && implied <= *iv)
            .map(|(regime, _, _)| *regime)
            .unwrap_or(VolatilityRegime::Crisis)
    }
}

/// Trading stance implied by the volatility risk premium
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolSignal {
    SellVol,
    BuyVol,
    Neutral,
}

/// Implied minus realized volatility
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolRiskPremium {
    pub absolute: f64,
    /// Premium relative to realized volatility
    pub relative: f64,
    pub signal: VolSignal,
}

impl VolRiskPremium {
    pub fn compute(implied: f64, realized: f64) -> Self {
        let absolute = implied - realized;
        let relative = if realized > 0.0 {
            absolute / realized
        } else {
            0.0
        };
        let signal = if relative > 0.30 {
            VolSignal::SellVol
        } else if relative < -0.10 {
            VolSignal::BuyVol
        } else {
            VolSignal::Neutral
        };
        Self {
            absolute,
            relative,
            signal,
        }
    }
}
