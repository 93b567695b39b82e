//! Benchmarks for fair value calculation

use binary_edge::feed::Candle;
use binary_edge::market::ContractQuote;
use binary_edge::model::{BinaryOptionPricer, VolatilityEstimators};
use binary_edge::orderbook::OrderBook;
use binary_edge::signal::MispricingEngine;
use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal_macros::dec;

fn candles(count: i64) -> Vec<Candle> {
    let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    (0..count)
        .map(|i| {
            let close = 100_000.0 * (1.0 + 0.003 * ((i % 11) as f64 - 5.0));
            Candle {
                timestamp: start + Duration::hours(i),
                open: close * 0.999,
                high: close * 1.004,
                low: close * 0.996,
                close,
                volume: 1.0,
            }
        })
        .collect()
}

fn benchmark_digital_probability(c: &mut Criterion) {
    let pricer = BinaryOptionPricer::new();

    c.bench_function("probability_above_strike", |b| {
        b.iter(|| pricer.probability_above_strike(black_box(100_500.0), black_box(101_000.0), 1.0, 0.50))
    });

    c.bench_function("probability_above_strike_atm", |b| {
        b.iter(|| pricer.probability_above_strike(black_box(100_000.0), black_box(100_000.0), 1.0, 0.50))
    });
}

fn benchmark_volatility(c: &mut Criterion) {
    let estimators = VolatilityEstimators::default();
    let week = candles(168);
    let month = candles(744);

    c.bench_function("yang_zhang_24", |b| b.iter(|| estimators.yang_zhang(black_box(&week), 24)));
    c.bench_function("har_rv_forecast", |b| b.iter(|| estimators.har_rv_forecast(black_box(&month))));
}

fn benchmark_contract_evaluation(c: &mut Criterion) {
    let engine = MispricingEngine::default();
    let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let quote = ContractQuote {
        ticker: "KXBTCD-23NOV1417-T101000".into(),
        title: String::new(),
        strike: 101_000.0,
        expiry: now + Duration::hours(1),
        yes_bid: Some(dec!(0.55)),
        yes_ask: Some(dec!(0.60)),
        no_bid: Some(dec!(0.40)),
        no_ask: Some(dec!(0.45)),
        status: "active".into(),
    };
    let flow = engine
        .flow_analyzer()
        .imbalance(&OrderBook::from_bid_levels("KXBTCD-23NOV1417-T101000", &[[55, 300], [54, 200]], &[[40, 100]]));

    c.bench_function("evaluate_contract", |b| {
        b.iter(|| engine.evaluate(black_box(&quote), 100_000.0, 0.50, Some(flow), now))
    });
}

criterion_group!(
    benches,
    benchmark_digital_probability,
    benchmark_volatility,
    benchmark_contract_evaluation
);
criterion_main!(benches);
