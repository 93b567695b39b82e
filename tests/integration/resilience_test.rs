//! Breaker, retry and stale-cache behaviour through the assembled context

use crate::common::{btc_exchange, paper_context, FlakySource};
use binary_edge::cache::Freshness;
use binary_edge::config::{ApiOverride, Config};
use binary_edge::feed::Asset;
use binary_edge::resilience::{ApiName, BreakerState};
use binary_edge::ErrorKind;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn coinbase_threshold(threshold: u32, reset_secs: u64) -> Config {
    let mut config = Config::default();
    config.apis.insert(
        "coinbase".into(),
        ApiOverride {
            fail_threshold: Some(threshold),
            reset_timeout_secs: Some(reset_secs),
            ..Default::default()
        },
    );
    config
}

#[tokio::test(start_paused = true)]
async fn test_breaker_opens_fails_fast_and_recovers() {
    let source = Arc::new(FlakySource::new(ApiName::Coinbase, 100_000.0));
    source.spot_down.store(true, Ordering::SeqCst);
    let context = paper_context(coinbase_threshold(3, 30), source.clone(), btc_exchange());

    // Three attempts, all transient: the third trips the breaker
    let err = context.signals().analyze(Asset::Btc).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transient);
    assert_eq!(source.calls(), 3);
    assert_eq!(context.breaker_status()["coinbase"].state, BreakerState::Open);

    // Open: no call reaches the source
    let err = context.signals().analyze(Asset::Btc).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    assert_eq!(source.calls(), 3);

    // After the reset timeout a successful trial call closes it
    source.spot_down.store(false, Ordering::SeqCst);
    tokio::time::advance(Duration::from_secs(31)).await;
    let analysis = context.signals().analyze(Asset::Btc).await.unwrap();
    assert_eq!(analysis.spot, 100_000.0);
    assert_eq!(context.breaker_status()["coinbase"].state, BreakerState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_other_apis_unaffected_by_open_breaker() {
    let source = Arc::new(FlakySource::new(ApiName::Coinbase, 100_000.0));
    source.spot_down.store(true, Ordering::SeqCst);
    let context = paper_context(coinbase_threshold(1, 60), source, btc_exchange());

    assert!(context.signals().analyze(Asset::Btc).await.is_err());
    let status = context.breaker_status();
    assert_eq!(status["coinbase"].state, BreakerState::Open);
    assert_eq!(status["kalshi"].state, BreakerState::Closed);

    let balance = context.executor().balance().await.unwrap();
    assert_eq!(balance.balance_cents, 1_000_000);
}

#[tokio::test(start_paused = true)]
async fn test_stale_candles_served_then_expire() {
    let source = Arc::new(FlakySource::new(ApiName::Coinbase, 100_000.0));
    let context = paper_context(Config::default(), source.clone(), btc_exchange());
    let signals = context.signals();

    let fresh = signals.analyze(Asset::Btc).await.unwrap();
    assert_eq!(fresh.candle_count, 48);
    let fresh_vol = fresh.volatility.realized.value;

    // Past the serving TTL with every candle source failing
    source.candles_down.store(true, Ordering::SeqCst);
    tokio::time::advance(Duration::from_secs(61)).await;
    let stale = signals.analyze(Asset::Btc).await.unwrap();
    assert!(stale.candles_stale);
    assert_eq!(stale.candle_count, 48);
    assert_eq!(stale.volatility.realized.value, fresh_vol);

    let health = signals.default_cache_health(Asset::Btc);
    assert!(health.stale_active);
    assert!(health.last_stale_error.unwrap().contains("504"));

    // Past retention nothing is left to serve and the stale flag clears
    tokio::time::advance(Duration::from_secs(301)).await;
    let empty = signals.analyze(Asset::Btc).await.unwrap();
    assert_eq!(empty.candle_count, 0);
    assert!(!empty.candles_stale);
    assert!(!signals.default_cache_health(Asset::Btc).stale_active);
}

#[test]
fn test_freshness_serializes_with_kind_tag() {
    let json = serde_json::to_string(&Freshness::Live {
        source: "kraken".into(),
    })
    .unwrap();
    assert_eq!(json, r#"{"kind":"live","source":"kraken"}"#);
}
