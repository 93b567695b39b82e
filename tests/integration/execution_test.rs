//! Trade execution integration tests

use crate::common::{btc_exchange, paper_context, request_body, FlakySource, Reply, StubUpstream, FAR_OTM, NEAR_ITM};
use binary_edge::config::Config;
use binary_edge::execution::{ExecutorConfig, InMemoryTradeStore, TradeExecutor, TradeRequest, TradeStatus};
use binary_edge::kalshi::{KalshiClient, OrderAction, OrderApi, OrderRequest, OrderType};
use binary_edge::resilience::{ApiName, ResilientCaller, RetryPolicy};
use binary_edge::signal::Side;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const DUPLICATE_ORDER: &str = r#"{"error": {"code": "order_already_exists", "message": "order already exists"}}"#;

/// Order listing holding one filled order under `client_order_id`
fn listed_orders(client_order_id: &str) -> String {
    serde_json::json!({
        "orders": [
            {"order_id": "o-other", "client_order_id": "edge_other", "status": "resting", "fill_count": 0},
            {"order_id": "o-1", "client_order_id": client_order_id, "status": "executed", "fill_count": 3, "avg_price": 52},
        ],
        "cursor": ""
    })
    .to_string()
}

fn buy(ticker: &str, direction: Side, contracts: u32) -> TradeRequest {
    TradeRequest {
        ticker: ticker.to_string(),
        direction,
        strike: 98_000.0,
        contracts,
        order_type: OrderType::Market,
        limit_price_cents: None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_lost_response_is_not_filled_twice() {
    let exchange = btc_exchange();
    exchange.lose_next_responses(2);
    let source = Arc::new(FlakySource::new(ApiName::Coinbase, 100_000.0));
    let context = paper_context(Config::default(), source, exchange.clone());

    let response = context.executor().execute_trade(buy(NEAR_ITM, Side::Yes, 3)).await;
    assert!(response.success, "{:?}", response.error);
    assert_eq!(response.filled, 3);

    // Three attempts reached the exchange, one order exists
    assert_eq!(exchange.submissions(), 3);
    let orders = exchange.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(Some(&orders[0].client_order_id), response.client_order_id.as_ref());
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_cancel_the_trade() {
    let exchange = btc_exchange();
    exchange.lose_next_responses(5);
    let source = Arc::new(FlakySource::new(ApiName::Coinbase, 100_000.0));
    let context = paper_context(Config::default(), source, exchange.clone());
    let executor = context.executor();

    let response = executor.execute_trade(buy(NEAR_ITM, Side::Yes, 1)).await;
    assert!(!response.success);
    assert_eq!(response.status, Some(TradeStatus::Cancelled));
    let trade = executor.get_trade(response.trade_id.unwrap()).await.unwrap();
    assert!(trade.error.unwrap().contains("connection reset"));
}

#[tokio::test]
async fn test_concurrent_close_sells_once() {
    let exchange = btc_exchange();
    let source = Arc::new(FlakySource::new(ApiName::Coinbase, 100_000.0));
    let context = paper_context(Config::default(), source, exchange.clone());
    let executor = context.executor().clone();

    let opened = executor.execute_trade(buy(FAR_OTM, Side::No, 4)).await;
    assert_eq!(opened.status, Some(TradeStatus::Open));
    assert_eq!(opened.price, Some(dec!(0.70)));
    let id = opened.trade_id.unwrap();

    let other = executor.clone();
    let (a, b) = tokio::join!(executor.close_position(id), other.close_position(id));
    assert_eq!([a.success, b.success].iter().filter(|s| **s).count(), 1);
    let loser = if a.success { b } else { a };
    assert!(loser.error.is_some());

    // One entry, one exit
    assert_eq!(exchange.orders().len(), 2);
    let trade = executor.get_trade(id).await.unwrap();
    assert_eq!(trade.status, TradeStatus::Closed);
    // Sold at the no bid of 68: (0.68 - 0.70) * 4, no fee on a loss
    assert_eq!(trade.pnl, Some(dec!(-0.08)));
    assert_eq!(trade.fees, dec!(0));
}

#[tokio::test]
async fn test_rejection_message_is_preserved() {
    let exchange = btc_exchange();
    exchange.reject_next("market is closed for trading");
    let source = Arc::new(FlakySource::new(ApiName::Coinbase, 100_000.0));
    let context = paper_context(Config::default(), source, exchange);

    let response = context.executor().execute_trade(buy(NEAR_ITM, Side::Yes, 1)).await;
    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("market is closed for trading"));
    assert_eq!(response.status, Some(TradeStatus::Cancelled));
}

#[tokio::test]
async fn test_history_is_newest_first() {
    let exchange = btc_exchange();
    let source = Arc::new(FlakySource::new(ApiName::Coinbase, 100_000.0));
    let context = paper_context(Config::default(), source, exchange);
    let executor = context.executor();

    let first = executor.execute_trade(buy(NEAR_ITM, Side::Yes, 1)).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = executor.execute_trade(buy(FAR_OTM, Side::No, 1)).await;

    let history = executor.trade_history(10, 0).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(Some(history[0].id), second.trade_id);
    assert_eq!(Some(history[1].id), first.trade_id);
    assert_eq!(executor.trade_history(10, 1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_kalshi_duplicate_submission_returns_existing_order() {
    let stub = StubUpstream::start(|request| {
        if request.starts_with("POST /trade-api/v2/portfolio/orders") {
            Reply::Json(409, DUPLICATE_ORDER.to_string())
        } else if request.starts_with("GET /trade-api/v2/portfolio/orders") {
            Reply::Json(200, listed_orders("edge_abc"))
        } else {
            Reply::Json(404, "{}".to_string())
        }
    })
    .await;
    let client = KalshiClient::new(reqwest::Client::new(), &stub.base_url);

    let ack = client
        .place_order(&OrderRequest {
            ticker: NEAR_ITM.to_string(),
            side: Side::Yes,
            action: OrderAction::Buy,
            count: 3,
            order_type: OrderType::Market,
            limit_price_cents: None,
            client_order_id: "edge_abc".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(ack.order_id, "o-1");
    assert_eq!(ack.client_order_id, "edge_abc");
    assert_eq!(ack.filled_count, 3);
    assert_eq!(ack.avg_price_cents, Some(dec!(52)));

    let lines = stub.request_lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "POST /trade-api/v2/portfolio/orders");
    assert!(lines[1].starts_with("GET /trade-api/v2/portfolio/orders?ticker="));
}

#[tokio::test]
async fn test_live_retry_after_lost_response_keeps_the_fill() {
    let mut posts = 0;
    let mut submitted = String::new();
    let stub = StubUpstream::start(move |request| {
        if request.starts_with("POST /trade-api/v2/portfolio/orders") {
            posts += 1;
            let body: serde_json::Value = serde_json::from_str(request_body(request)).unwrap_or_default();
            submitted = body["client_order_id"].as_str().unwrap_or_default().to_string();
            // The first attempt is accepted upstream but its response never arrives
            if posts == 1 {
                Reply::Hangup
            } else {
                Reply::Json(409, DUPLICATE_ORDER.to_string())
            }
        } else if request.starts_with("GET /trade-api/v2/portfolio/orders") {
            Reply::Json(200, listed_orders(&submitted))
        } else {
            Reply::Json(404, "{}".to_string())
        }
    })
    .await;

    let kalshi = Arc::new(KalshiClient::new(reqwest::Client::new(), &stub.base_url));
    let policy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
    };
    let executor = TradeExecutor::new(
        kalshi.clone(),
        kalshi,
        Arc::new(InMemoryTradeStore::new()),
        Arc::new(ResilientCaller::new(&HashMap::new(), policy)),
        ExecutorConfig::default(),
    );

    let response = executor.execute_trade(buy(NEAR_ITM, Side::Yes, 3)).await;
    assert!(response.success, "{:?}", response.error);
    assert_eq!(response.status, Some(TradeStatus::Open));
    assert_eq!(response.order_id.as_deref(), Some("o-1"));
    assert_eq!(response.filled, 3);
    assert_eq!(response.price, Some(dec!(0.52)));

    let posts: Vec<String> = stub
        .request_lines()
        .into_iter()
        .filter(|line| line.starts_with("POST"))
        .collect();
    assert_eq!(posts.len(), 2);
}
