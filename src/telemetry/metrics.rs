//! Prometheus metrics
//!
//! Recorded through the `metrics` facade; exported when a Prometheus
//! recorder is installed, otherwise no-ops.

use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// One attempt of an outbound API call
    ApiCall,
    /// Full signal generation pass for one asset
    SignalGeneration,
    /// Order submission including retries
    OrderSubmission,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Circuit breaker state change
    BreakerTransition,
    /// Upstream answered 429
    RateLimited,
    /// Retry scheduled
    Retry,
    /// Stale snapshot served in place of live data
    StaleServed,
    /// Signal emitted by the ranking pass
    SignalEmitted,
    /// Trade record reached a terminal or open state
    TradeOutcome,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Realized P&L of closed trades
    RealizedPnl,
    /// Open position count
    OpenPositions,
    /// Current volatility estimate used for pricing
    CurrentVolatility,
}

impl LatencyMetric {
    fn name(&self) -> &'static str {
        match self {
            LatencyMetric::ApiCall => "binary_edge_api_call_latency_ms",
            LatencyMetric::SignalGeneration => "binary_edge_signal_generation_latency_ms",
            LatencyMetric::OrderSubmission => "binary_edge_order_submission_latency_ms",
        }
    }
}

impl CounterMetric {
    fn name(&self) -> &'static str {
        match self {
            CounterMetric::BreakerTransition => "binary_edge_breaker_transitions_total",
            CounterMetric::RateLimited => "binary_edge_rate_limited_total",
            CounterMetric::Retry => "binary_edge_retries_total",
            CounterMetric::StaleServed => "binary_edge_stale_served_total",
            CounterMetric::SignalEmitted => "binary_edge_signals_total",
            CounterMetric::TradeOutcome => "binary_edge_trades_total",
        }
    }
}

impl GaugeMetric {
    fn name(&self) -> &'static str {
        match self {
            GaugeMetric::RealizedPnl => "binary_edge_realized_pnl_usd",
            GaugeMetric::OpenPositions => "binary_edge_open_positions",
            GaugeMetric::CurrentVolatility => "binary_edge_current_volatility",
        }
    }
}

/// Record a latency measurement for `source` (an API or asset name)
pub fn record_latency(metric: LatencyMetric, source: impl std::fmt::Display, duration: Duration) {
    ::metrics::histogram!(metric.name(), "source" => source.to_string())
        .record(duration.as_secs_f64() * 1000.0);
}

/// Increment a counter for `source` with a detail label (state, kind, side)
pub fn increment_counter(
    metric: CounterMetric,
    source: impl std::fmt::Display,
    detail: &'static str,
) {
    ::metrics::counter!(metric.name(), "source" => source.to_string(), "detail" => detail)
        .increment(1);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    ::metrics::gauge!(metric.name()).set(value);
}
