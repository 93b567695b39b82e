//! Black-Scholes digital option pricer
//!
//! P(S_T > K) = N(d2) with d2 = (ln(S/K) - σ²T/2) / (σ√T), zero rate and
//! T in years of 8760 hours.

use super::ProbabilityModel;
use statrs::function::erf::erfc;

/// Hours in the pricing year
pub const HOURS_PER_YEAR: f64 = 24.0 * 365.0;

/// Standard normal CDF
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Digital (cash-or-nothing) option pricer
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryOptionPricer;

impl BinaryOptionPricer {
    pub fn new() -> Self {
        Self
    }

    /// Risk-neutral probability that spot finishes above `strike`
    pub fn probability_above_strike(&self, spot: f64, strike: f64, hours: f64, vol: f64) -> f64 {
        match d2(spot, strike, hours, vol) {
            Pricing::Neutral => 0.5,
            Pricing::Expired => indicator(spot > strike),
            Pricing::D2(d2) => normal_cdf(d2),
        }
    }

    /// Risk-neutral probability that spot finishes below `strike`
    pub fn probability_below_strike(&self, spot: f64, strike: f64, hours: f64, vol: f64) -> f64 {
        match d2(spot, strike, hours, vol) {
            Pricing::Neutral => 0.5,
            Pricing::Expired => indicator(spot < strike),
            Pricing::D2(d2) => normal_cdf(-d2),
        }
    }
}

impl ProbabilityModel for BinaryOptionPricer {
    fn probability_above(&self, spot: f64, strike: f64, hours: f64, vol: f64) -> f64 {
        self.probability_above_strike(spot, strike, hours, vol)
    }
}

enum Pricing {
    /// Undefined inputs
    Neutral,
    /// Outcome already determined by spot vs strike
    Expired,
    D2(f64),
}

fn d2(spot: f64, strike: f64, hours: f64, vol: f64) -> Pricing {
    if !(spot > 0.0 && strike > 0.0) {
        return Pricing::Neutral;
    }
    let t = hours / HOURS_PER_YEAR;
    if hours <= 0.0 || t <= 0.0 || vol <= 0.0 || !vol.is_finite() {
        return Pricing::Expired;
    }
    let sigma_sqrt_t = vol * t.sqrt();
    Pricing::D2(((spot / strike).ln() - 0.5 * vol * vol * t) / sigma_sqrt_t)
}

fn indicator(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}
