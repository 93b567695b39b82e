//! Realized volatility estimators over hourly candles
//!
//! Every estimator returns [`DEFAULT_VOLATILITY`] when given too few candles
//! so downstream pricing always has an input.

use crate::feed::Candle;
use serde::{Deserialize, Serialize};

/// Annualized volatility used whenever history is insufficient
pub const DEFAULT_VOLATILITY: f64 = 0.50;

/// Hourly periods per year (24 * 365)
pub const HOURLY_PERIODS_PER_YEAR: f64 = 8760.0;

const HAR_DAILY: usize = 24;
const HAR_WEEKLY: usize = 168;
const HAR_MONTHLY: usize = 720;
const HAR_INTERCEPT: f64 = 1e-6;
const HAR_BETA_DAILY: f64 = 0.35;
const HAR_BETA_WEEKLY: f64 = 0.35;
const HAR_BETA_MONTHLY: f64 = 0.25;

/// Estimator that produced a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolMethod {
    CloseToClose,
    Parkinson,
    YangZhang,
    HarRv,
    /// Implied volatility index (DVOL)
    Implied,
}

/// Confidence in an estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolConfidence {
    High,
    Medium,
    Low,
}

/// An annualized volatility estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityEstimate {
    /// Annualized volatility as a decimal
    pub value: f64,
    pub method: VolMethod,
    pub confidence: VolConfidence,
    /// False when `value` is the fallback default
    pub sufficient_data: bool,
}

impl VolatilityEstimate {
    fn default_for(method: VolMethod) -> Self {
        Self {
            value: DEFAULT_VOLATILITY,
            method,
            confidence: VolConfidence::Low,
            sufficient_data: false,
        }
    }

    fn measured(value: f64, method: VolMethod) -> Self {
        Self {
            value,
            method,
            confidence: VolConfidence::High,
            sufficient_data: true,
        }
    }

    /// Wrap an implied volatility index reading
    pub fn implied(value: f64) -> Self {
        Self::measured(value, VolMethod::Implied)
    }
}

/// Realized volatility estimators
#[derive(Debug, Clone, Copy)]
pub struct VolatilityEstimators {
    periods_per_year: f64,
}

impl Default for VolatilityEstimators {
    fn default() -> Self {
        Self::new(HOURLY_PERIODS_PER_YEAR)
    }
}

impl VolatilityEstimators {
    pub fn new(periods_per_year: f64) -> Self {
        Self { periods_per_year }
    }

    fn annualize(&self, variance: f64) -> f64 {
        (variance * self.periods_per_year).sqrt()
    }

    /// Sample std-dev of log close-to-close returns over the last `window + 1`
    /// candles
    pub fn close_to_close(&self, candles: &[Candle], window: usize) -> VolatilityEstimate {
        if window < 2 || candles.len() < window + 1 {
            return VolatilityEstimate::default_for(VolMethod::CloseToClose);
        }
        let tail = &candles[candles.len() - (window + 1)..];
        let returns: Vec<f64> = tail
            .windows(2)
            .map(|w| (w[1].close / w[0].close).ln())
            .collect();
        VolatilityEstimate::measured(
            self.annualize(sample_variance(&returns)),
            VolMethod::CloseToClose,
        )
    }

    /// High-low range estimator over the last `window` candles
    pub fn parkinson(&self, candles: &[Candle], window: usize) -> VolatilityEstimate {
        if window == 0 || candles.len() < window {
            return VolatilityEstimate::default_for(VolMethod::Parkinson);
        }
        let tail = &candles[candles.len() - window..];
        let sum_sq: f64 = tail.iter().map(|c| (c.high / c.low).ln().powi(2)).sum();
        let variance = sum_sq / (4.0 * std::f64::consts::LN_2 * window as f64);
        VolatilityEstimate::measured(self.annualize(variance), VolMethod::Parkinson)
    }

    /// Yang-Zhang estimator over the last `window` candles.
    ///
    /// Needs `window + 1` candles for the first overnight return.
    pub fn yang_zhang(&self, candles: &[Candle], window: usize) -> VolatilityEstimate {
        let n = window;
        if n < 2 || candles.len() < n + 1 {
            return VolatilityEstimate::default_for(VolMethod::YangZhang);
        }
        let tail = &candles[candles.len() - (n + 1)..];

        let mut overnight = Vec::with_capacity(n);
        let mut open_close = Vec::with_capacity(n);
        let mut rogers_satchell = 0.0;
        for pair in tail.windows(2) {
            let (prev, c) = (&pair[0], &pair[1]);
            overnight.push((c.open / prev.close).ln());
            open_close.push((c.close / c.open).ln());
            rogers_satchell += (c.high / c.close).ln() * (c.high / c.open).ln()
                + (c.low / c.close).ln() * (c.low / c.open).ln();
        }

        let nf = n as f64;
        let k = 0.34 / (1.34 + (nf + 1.0) / (nf - 1.0));
        let variance = sample_variance(&overnight)
            + k * sample_variance(&open_close)
            + (1.0 - k) * (rogers_satchell / nf);

        VolatilityEstimate::measured(self.annualize(variance.abs()), VolMethod::YangZhang)
    }

    /// HAR-RV forecast from daily, weekly and monthly realized variance.
    ///
    /// Needs at least 720 hourly returns; otherwise returns the default with
    /// low confidence. Confidence drops when the daily component runs well
    /// ahead of the monthly one.
    pub fn har_rv_forecast(&self, candles: &[Candle]) -> VolatilityEstimate {
        if candles.len() < HAR_MONTHLY + 1 {
            return VolatilityEstimate::default_for(VolMethod::HarRv);
        }
        let squared: Vec<f64> = candles
            .windows(2)
            .map(|w| (w[1].close / w[0].close).ln().powi(2))
            .collect();
        let tail_sum = |len: usize| squared[squared.len() - len..].iter().sum::<f64>();

        let rv_daily = tail_sum(HAR_DAILY);
        let rv_weekly = tail_sum(HAR_WEEKLY) / 7.0;
        let rv_monthly = tail_sum(HAR_MONTHLY) / 30.0;

        let daily_variance = HAR_INTERCEPT
            + HAR_BETA_DAILY * rv_daily
            + HAR_BETA_WEEKLY * rv_weekly
            + HAR_BETA_MONTHLY * rv_monthly;
        let days_per_year = self.periods_per_year / HAR_DAILY as f64;
        let value = (daily_variance.max(0.0) * days_per_year).sqrt();

        let ratio = if rv_monthly > 0.0 {
            rv_daily / rv_monthly
        } else {
            1.0
        };
        let confidence = if ratio > 2.0 {
            VolConfidence::Low
        } else if ratio > 1.5 {
            VolConfidence::Medium
        } else {
            VolConfidence::High
        };

        VolatilityEstimate {
            value,
            method: VolMethod::HarRv,
            confidence,
            sufficient_data: true,
        }
    }
}

/// Unbiased sample variance (ddof = 1)
fn sample_variance(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)
}
