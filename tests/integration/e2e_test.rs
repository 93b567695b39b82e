//! End-to-end integration tests

use crate::common::{btc_exchange, paper_context, FlakySource, ATM, FAR_OTM, NEAR_ITM};
use binary_edge::config::Config;
use binary_edge::execution::{ExecutionMode, TradeStatus};
use binary_edge::feed::Asset;
use binary_edge::resilience::ApiName;
use binary_edge::signal::{Side, TradeAction};
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;

#[test]
fn test_config_example_loads() {
    let config = Config::load("config.toml.example").unwrap();
    assert_eq!(config.execution.mode, ExecutionMode::Paper);
    assert_eq!(config.signal.top_n, 10);
    assert_eq!(config.cache.retention_secs, 300);
    assert!(config.telemetry.metrics_port.is_none());
    assert_eq!(config.feed.sources.len(), 3);
}

#[tokio::test]
async fn test_signals_rank_the_earliest_expiry() {
    let source = Arc::new(FlakySource::new(ApiName::Coinbase, 100_000.0));
    let context = paper_context(Config::default(), source, btc_exchange());

    let analysis = context.signals().analyze(Asset::Btc).await.unwrap();
    assert_eq!(analysis.candle_count, 48);
    assert!(!analysis.candles_stale);
    assert_eq!(analysis.contracts_considered, 3);

    let ranked: Vec<(&str, TradeAction)> = analysis
        .signals
        .iter()
        .map(|s| (s.ticker.as_str(), s.action))
        .collect();
    assert_eq!(
        ranked,
        vec![
            (NEAR_ITM, TradeAction::BuyYes),
            (FAR_OTM, TradeAction::BuyNo),
            (ATM, TradeAction::Hold),
        ]
    );
    assert!(analysis.signals.iter().all(|s| s.book_consistent));
    assert!(analysis.signals[0].expected_value > analysis.signals[1].expected_value);
}

#[tokio::test]
async fn test_signal_to_closed_trade() {
    let exchange = btc_exchange();
    let source = Arc::new(FlakySource::new(ApiName::Coinbase, 100_000.0));
    let context = paper_context(Config::default(), source, exchange.clone());
    let executor = context.executor();

    let signals = context.signals().get_ranked_signals(Asset::Btc).await.unwrap();
    let opened = executor.execute_from_signal(&signals[0], 5).await;
    assert!(opened.success, "{:?}", opened.error);
    assert_eq!(opened.status, Some(TradeStatus::Open));
    assert_eq!(opened.filled, 5);
    assert_eq!(opened.price, Some(dec!(0.50)));
    let trade_id = opened.trade_id.unwrap();

    // Hold signals are refused
    let hold = executor.execute_from_signal(&signals[2], 5).await;
    assert!(!hold.success);

    // Market moves in our favour
    exchange.set_book(NEAR_ITM, &[[60, 100]], &[[38, 100]]);
    let positions = executor.get_open_positions().await.unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].direction, Side::Yes);
    assert_eq!(positions[0].current_price, Some(dec!(0.60)));

    let closed = executor.close_position(trade_id).await;
    assert!(closed.success, "{:?}", closed.error);
    assert_eq!(closed.status, Some(TradeStatus::Closed));
    // gross 0.50, fee 7% of the gain
    assert_eq!(closed.pnl, Some(dec!(0.465)));

    assert!(executor.get_open_positions().await.unwrap().is_empty());
    let summary = executor.pnl_summary(Utc::now() - Duration::hours(1)).await.unwrap();
    assert_eq!(summary.trade_count, 1);
    assert_eq!(summary.wins, 1);
    assert_eq!(summary.total_pnl, dec!(0.465));

    // 1_000_000 - 250 + 300
    assert_eq!(executor.balance().await.unwrap().balance_cents, 1_000_050);
}

#[tokio::test]
async fn test_status_reports_breakers_and_cache() {
    let source = Arc::new(FlakySource::new(ApiName::Coinbase, 100_000.0));
    let context = paper_context(Config::default(), source, btc_exchange());
    context.signals().analyze(Asset::Btc).await.unwrap();

    let status = context.status();
    assert_eq!(status.breakers["kalshi"].fail_max, 3);
    let btc = &status.candle_cache[0];
    assert_eq!(btc.cached_count, Some(48));
    assert!(btc.last_success_at.is_some());
    assert!(serde_json::to_string(&status).unwrap().contains("\"coinbase\""));
}
