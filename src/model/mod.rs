//! Fair value model module
//!
//! Realized/implied volatility and the digital option pricer that turns it
//! into a probability of finishing above strike

mod pricer;
mod regime;
mod volatility;

pub use pricer::{normal_cdf, BinaryOptionPricer, HOURS_PER_YEAR};
pub use regime::{VolRiskPremium, VolSignal, VolatilityRegime};
pub use volatility::{
    VolConfidence, VolMethod, VolatilityEstimate, VolatilityEstimators, DEFAULT_VOLATILITY,
    HOURLY_PERIODS_PER_YEAR,
};

use serde::Serialize;

/// Trait for fair probability models
pub trait ProbabilityModel: Send + Sync {
    /// Probability that `spot` finishes above `strike` after `hours`
    fn probability_above(&self, spot: f64, strike: f64, hours: f64, vol: f64) -> f64;
}

/// Volatility inputs gathered for one pricing pass
#[derive(Debug, Clone, Serialize)]
pub struct VolatilitySummary {
    /// Estimate actually used for pricing
    pub pricing: VolatilityEstimate,
    pub realized: VolatilityEstimate,
    pub parkinson: VolatilityEstimate,
    pub har_forecast: VolatilityEstimate,
    /// DVOL when the index was available
    pub implied: Option<f64>,
    pub regime: VolatilityRegime,
    pub risk_premium: Option<VolRiskPremium>,
}

impl VolatilitySummary {
    /// Build from candles and an optional implied index, preferring implied
    /// volatility for pricing and falling back to Yang-Zhang realized
    pub fn build(
        estimators: &VolatilityEstimators,
        candles: &[crate::feed::Candle],
        window: usize,
        implied: Option<f64>,
    ) -> Self {
        let realized = estimators.yang_zhang(candles, window);
        let implied = implied.filter(|v| v.is_finite() && *v > 0.0);
        let pricing = implied
            .map(VolatilityEstimate::implied)
            .unwrap_or(realized);

        Self {
            pricing,
            realized,
            parkinson: estimators.parkinson(candles, window),
            har_forecast: estimators.har_rv_forecast(candles),
            implied,
            regime: VolatilityRegime::classify(realized.value, implied.unwrap_or(realized.value)),
            risk_premium: implied.map(|iv| VolRiskPremium::compute(iv, realized.value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_prefers_implied() {
        let est = VolatilityEstimators::default();
        let summary = VolatilitySummary::build(&est, &[], 24, Some(0.62));
        assert_eq!(summary.pricing.method, VolMethod::Implied);
        assert_eq!(summary.pricing.value, 0.62);
        assert!(summary.risk_premium.is_some());
    }

    #[test]
    fn test_summary_falls_back_to_realized() {
        let est = VolatilityEstimators::default();
        let summary = VolatilitySummary::build(&est, &[], 24, None);
        assert_eq!(summary.pricing.method, VolMethod::YangZhang);
        assert_eq!(summary.pricing.value, DEFAULT_VOLATILITY);
        assert_eq!(summary.regime, VolatilityRegime::Normal);
    }
}
