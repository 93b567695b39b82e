//! Trade executor
//!
//! Owns the trade lifecycle: PENDING on request, then OPEN / PARTIAL on fill
//! or CANCELLED on failure, CLOSED after a successful sell. Orders go out
//! through the resilient caller; the exchange's submission lock is held for
//! each individual request only, never across limiter waits or retry
//! backoff. Each submission runs in its own task so it completes and is
//! recorded even if the requester goes away.

use super::{PnlSummary, Position, Trade, TradeId, TradeRequest, TradeResponse, TradeStatus, TradeStore};
use crate::error::{Error, Result};
use crate::kalshi::{Balance, MarketApi, OrderAck, OrderAction, OrderApi, OrderRequest, OrderType};
use crate::resilience::{ApiName, ResilientCaller};
use crate::signal::{Side, Signal};
use crate::telemetry::{increment_counter, record_latency, set_gauge, CounterMetric, GaugeMetric, LatencyMetric};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Executor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Fee charged on positive realized P&L
    pub fee_rate: Decimal,
    /// Prefix of generated client order ids
    pub client_order_prefix: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            fee_rate: Decimal::new(7, 2),
            client_order_prefix: "edge".to_string(),
        }
    }
}

struct Inner {
    orders: Arc<dyn OrderApi>,
    markets: Arc<dyn MarketApi>,
    store: Arc<dyn TradeStore>,
    caller: Arc<ResilientCaller>,
    config: ExecutorConfig,
}

/// Executes and tracks trades
#[derive(Clone)]
pub struct TradeExecutor {
    inner: Arc<Inner>,
}

impl TradeExecutor {
    pub fn new(
        orders: Arc<dyn OrderApi>,
        markets: Arc<dyn MarketApi>,
        store: Arc<dyn TradeStore>,
        caller: Arc<ResilientCaller>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                orders,
                markets,
                store,
                caller,
                config,
            }),
        }
    }

    /// Open a position.
    ///
    /// The trade is stored as PENDING with a fresh client order id before
    /// the order is sent, so retried submissions are deduplicated upstream.
    pub async fn execute_trade(&self, request: TradeRequest) -> TradeResponse {
        if request.contracts == 0 {
            return TradeResponse::failure("Contract count must be positive");
        }

        let client_order_id = self.inner.client_order_id("");
        let trade = Trade::pending(&request, client_order_id.clone());
        if let Err(e) = self.inner.store.insert(&trade).await {
            return TradeResponse::failure(e.to_string());
        }
        info!(
            trade_id = %trade.id,
            ticker = %trade.ticker,
            side = %trade.direction,
            contracts = trade.contracts,
            client_order_id = %client_order_id,
            "Trade recorded, submitting order"
        );

        let order = OrderRequest {
            ticker: request.ticker.clone(),
            side: request.direction,
            action: OrderAction::Buy,
            count: request.contracts,
            order_type: request.order_type,
            limit_price_cents: request.limit_price_cents,
            client_order_id,
        };

        let inner = self.inner.clone();
        let task = tokio::spawn(async move { inner.submit_entry(trade, order).await });
        match task.await {
            Ok(response) => response,
            Err(e) => TradeResponse::failure(format!("Order submission task failed: {e}")),
        }
    }

    /// Trade the side a signal recommends, limited at its entry price
    pub async fn execute_from_signal(&self, signal: &Signal, contracts: u32) -> TradeResponse {
        let Some(side) = signal.side() else {
            return TradeResponse::failure(format!("Signal for {} recommends holding", signal.ticker));
        };
        let limit_price_cents = signal
            .entry_price()
            .and_then(|p| (p * 100.0).round().to_u32())
            .filter(|c| (1..=99).contains(c));
        let request = TradeRequest {
            ticker: signal.ticker.clone(),
            direction: side,
            strike: signal.strike,
            contracts,
            order_type: if limit_price_cents.is_some() {
                OrderType::Limit
            } else {
                OrderType::Market
            },
            limit_price_cents,
        };
        self.execute_trade(request).await
    }

    /// Sell an OPEN position at market and realize its P&L
    pub async fn close_position(&self, trade_id: TradeId) -> TradeResponse {
        let trade = match self.inner.store.claim_for_close(trade_id).await {
            Ok(trade) => trade,
            Err(Error::NotFound(_)) => return TradeResponse::failure(format!("Trade {trade_id} not found")),
            Err(Error::InvalidState(message)) => {
                return TradeResponse {
                    trade_id: Some(trade_id),
                    ..TradeResponse::failure(message)
                }
            }
            Err(e) => return TradeResponse::failure(e.to_string()),
        };

        let order = OrderRequest {
            ticker: trade.ticker.clone(),
            side: trade.direction,
            action: OrderAction::Sell,
            count: trade.filled_contracts,
            order_type: OrderType::Market,
            limit_price_cents: None,
            client_order_id: self.inner.client_order_id("close_"),
        };

        let inner = self.inner.clone();
        let task = tokio::spawn(async move { inner.submit_exit(trade, order).await });
        match task.await {
            Ok(response) => response,
            Err(e) => {
                let message = self
                    .inner
                    .release_claim(trade_id, format!("Close task failed: {e}"))
                    .await;
                TradeResponse {
                    trade_id: Some(trade_id),
                    ..TradeResponse::failure(message)
                }
            }
        }
    }

    /// OPEN positions marked at the best bid of the held side.
    ///
    /// A position whose book cannot be fetched is still listed, with no
    /// current price.
    pub async fn get_open_positions(&self) -> Result<Vec<Position>> {
        let open: Vec<Trade> = self
            .inner
            .store
            .list()
            .await?
            .into_iter()
            .filter(|t| t.status == TradeStatus::Open)
            .collect();
        set_gauge(GaugeMetric::OpenPositions, open.len() as f64);

        let marks = futures_util::future::join_all(open.iter().map(|t| self.inner.mark(t))).await;
        Ok(open
            .into_iter()
            .zip(marks)
            .map(|(trade, current_price)| {
                let unrealized_pnl = current_price
                    .zip(trade.entry_price)
                    .map(|(mark, entry)| self.inner.net_of_fees((mark - entry) * Decimal::from(trade.filled_contracts)).1);
                Position {
                    trade_id: trade.id,
                    ticker: trade.ticker,
                    direction: trade.direction,
                    strike: trade.strike,
                    contracts: trade.filled_contracts,
                    entry_price: trade.entry_price,
                    current_price,
                    unrealized_pnl,
                    status: trade.status,
                    opened_at: trade.opened_at,
                }
            })
            .collect())
    }

    /// Trades newest first
    pub async fn trade_history(&self, limit: usize, offset: usize) -> Result<Vec<Trade>> {
        let mut trades = self.inner.store.list().await?;
        trades.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));
        Ok(trades.into_iter().skip(offset).take(limit).collect())
    }

    /// Realized P&L of trades closed at or after `since`
    pub async fn pnl_summary(&self, since: DateTime<Utc>) -> Result<PnlSummary> {
        let closed: Vec<Trade> = self
            .inner
            .store
            .list()
            .await?
            .into_iter()
            .filter(|t| t.status == TradeStatus::Closed && t.closed_at.is_some_and(|at| at >= since))
            .collect();

        let pnl = |t: &Trade| t.pnl.unwrap_or_default();
        let wins = closed.iter().filter(|t| pnl(t) > Decimal::ZERO).count();
        let losses = closed.iter().filter(|t| pnl(t) < Decimal::ZERO).count();
        Ok(PnlSummary {
            since,
            total_pnl: closed.iter().map(pnl).sum(),
            total_fees: closed.iter().map(|t| t.fees).sum(),
            trade_count: closed.len(),
            wins,
            losses,
            win_rate: if closed.is_empty() {
                0.0
            } else {
                wins as f64 / closed.len() as f64
            },
        })
    }

    pub async fn balance(&self) -> Result<Balance> {
        let orders = &self.inner.orders;
        self.inner
            .caller
            .call(ApiName::Kalshi, 1.0, || orders.balance())
            .await
    }

    /// Cancel a resting order on the exchange
    pub async fn cancel_order(&self, order_id: &str) -> Result<()> {
        let lock = self.inner.caller.submission_lock(ApiName::Kalshi);
        let orders = &self.inner.orders;
        self.inner
            .caller
            .call(ApiName::Kalshi, 1.0, || {
                let lock = lock.clone();
                async move {
                    let _guard = lock.lock().await;
                    orders.cancel_order(order_id).await
                }
            })
            .await
    }

    pub async fn get_trade(&self, trade_id: TradeId) -> Result<Trade> {
        self.inner.store.get(trade_id).await
    }
}

impl Inner {
    fn client_order_id(&self, kind: &str) -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("{}_{kind}{}", self.config.client_order_prefix, &hex[..16])
    }

    /// Send `order` through the resilient caller, taking the submission lock
    /// per attempt
    async fn submit(&self, order: &OrderRequest) -> Result<OrderAck> {
        let lock = self.caller.submission_lock(ApiName::Kalshi);
        let started = Instant::now();
        let result = self
            .caller
            .call(ApiName::Kalshi, 1.0, || {
                let lock = lock.clone();
                async move {
                    let _guard = lock.lock().await;
                    self.orders.place_order(order).await
                }
            })
            .await;
        record_latency(LatencyMetric::OrderSubmission, ApiName::Kalshi, started.elapsed());
        result
    }

    async fn submit_entry(&self, mut trade: Trade, order: OrderRequest) -> TradeResponse {
        match self.submit(&order).await {
            Ok(ack) => {
                let price = ack.avg_price_cents.map(|c| c / Decimal::ONE_HUNDRED);
                trade.order_id = Some(ack.order_id.clone());
                trade.filled_contracts = ack.filled_count;
                trade.entry_price = price;
                trade.status = TradeStatus::from_fill(ack.filled_count, trade.contracts);
                increment_counter(CounterMetric::TradeOutcome, ApiName::Kalshi, status_label(trade.status));
                info!(
                    trade_id = %trade.id,
                    order_id = %ack.order_id,
                    filled = ack.filled_count,
                    status = %trade.status,
                    "Entry order acknowledged"
                );
                if let Err(e) = self.store.update(&trade).await {
                    warn!(trade_id = %trade.id, error = %e, "Failed to record fill");
                    return TradeResponse::failed_trade(&trade, e.to_string());
                }
                TradeResponse {
                    success: true,
                    trade_id: Some(trade.id),
                    order_id: Some(ack.order_id),
                    client_order_id: Some(trade.client_order_id),
                    status: Some(trade.status),
                    filled: ack.filled_count,
                    price,
                    cost: price.map(|p| p * Decimal::from(ack.filled_count)),
                    pnl: None,
                    error: None,
                }
            }
            Err(e) => {
                let message = upstream_message(&e);
                trade.status = TradeStatus::Cancelled;
                trade.error = Some(message.clone());
                increment_counter(CounterMetric::TradeOutcome, ApiName::Kalshi, status_label(trade.status));
                warn!(trade_id = %trade.id, kind = e.kind_label(), error = %e, "Entry order failed, trade cancelled");
                if let Err(store_err) = self.store.update(&trade).await {
                    warn!(trade_id = %trade.id, error = %store_err, "Failed to record cancellation");
                }
                TradeResponse::failed_trade(&trade, message)
            }
        }
    }

    async fn submit_exit(&self, mut trade: Trade, order: OrderRequest) -> TradeResponse {
        let (ack, exit_cents) = match self.submit(&order).await {
            Ok(ack) if ack.filled_count > 0 => match ack.avg_price_cents {
                Some(cents) => (ack, cents),
                None => {
                    warn!(trade_id = %trade.id, order_id = %ack.order_id, "Close fill carries no price");
                    let message = self
                        .release_claim(trade.id, format!("Close order {} filled without a price", ack.order_id))
                        .await;
                    return TradeResponse::failed_trade(&trade, message);
                }
            },
            Ok(_) => {
                let message = self.release_claim(trade.id, "Close order was not filled".into()).await;
                return TradeResponse::failed_trade(&trade, message);
            }
            Err(e) => {
                warn!(trade_id = %trade.id, error = %e, "Close order failed");
                let message = self.release_claim(trade.id, upstream_message(&e)).await;
                return TradeResponse::failed_trade(&trade, message);
            }
        };

        let exit = exit_cents / Decimal::ONE_HUNDRED;
        let entry = trade.entry_price.unwrap_or_default();
        let gross = (exit - entry) * Decimal::from(trade.filled_contracts);
        let (fees, pnl) = self.net_of_fees(gross);

        trade.exit_price = Some(exit);
        trade.fees = fees;
        trade.pnl = Some(pnl);
        trade.status = TradeStatus::Closed;
        trade.closed_at = Some(Utc::now());
        increment_counter(CounterMetric::TradeOutcome, ApiName::Kalshi, status_label(trade.status));
        info!(trade_id = %trade.id, exit = %exit, pnl = %pnl, fees = %fees, "Position closed");

        if let Err(e) = self.store.update(&trade).await {
            warn!(trade_id = %trade.id, error = %e, "Failed to record close");
            return TradeResponse::failed_trade(&trade, e.to_string());
        }
        self.publish_realized_pnl().await;

        TradeResponse {
            success: true,
            trade_id: Some(trade.id),
            order_id: Some(ack.order_id),
            client_order_id: Some(order.client_order_id),
            status: Some(trade.status),
            filled: ack.filled_count,
            price: Some(exit),
            cost: None,
            pnl: Some(pnl),
            error: None,
        }
    }

    /// Drop the close claim on `id` after a failed close. A release failure
    /// leaves the trade unclosable, so it is appended to `message`.
    async fn release_claim(&self, id: TradeId, message: String) -> String {
        match self.store.release_claim(id).await {
            Ok(()) => message,
            Err(e) => {
                error!(trade_id = %id, error = %e, "Failed to release close claim");
                format!("{message}; close claim not released: {e}")
            }
        }
    }

    /// (fees, net) where the fee applies only to a positive gross P&L
    fn net_of_fees(&self, gross: Decimal) -> (Decimal, Decimal) {
        if gross > Decimal::ZERO {
            let fees = gross * self.config.fee_rate;
            (fees, gross - fees)
        } else {
            (Decimal::ZERO, gross)
        }
    }

    /// Best bid on the held side, `None` when the book is unavailable or empty
    async fn mark(&self, trade: &Trade) -> Option<Decimal> {
        let book = self
            .caller
            .call(ApiName::Kalshi, 1.0, || self.markets.orderbook(&trade.ticker))
            .await;
        match book {
            Ok(book) => match trade.direction {
                Side::Yes => book.best_yes_bid(),
                Side::No => book.best_no_bid(),
            },
            Err(e) => {
                warn!(trade_id = %trade.id, ticker = %trade.ticker, error = %e, "Could not mark position");
                None
            }
        }
    }

    async fn publish_realized_pnl(&self) {
        if let Ok(trades) = self.store.list().await {
            let total: Decimal = trades.iter().filter_map(|t| t.pnl).sum();
            set_gauge(GaugeMetric::RealizedPnl, total.to_f64().unwrap_or_default());
        }
    }
}

/// The upstream's own words for a rejection, the error text otherwise
fn upstream_message(err: &Error) -> String {
    match err {
        Error::ExecutionRejected(message) => message.clone(),
        other => other.to_string(),
    }
}

fn status_label(status: TradeStatus) -> &'static str {
    match status {
        TradeStatus::Pending => "pending",
        TradeStatus::Partial => "partial",
        TradeStatus::Open => "open",
        TradeStatus::Closed => "closed",
        TradeStatus::Cancelled => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{InMemoryTradeStore, PaperExchange};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    /// Store whose close claims can never be released
    struct StuckClaimStore(InMemoryTradeStore);

    #[async_trait]
    impl TradeStore for StuckClaimStore {
        async fn insert(&self, trade: &Trade) -> Result<()> {
            self.0.insert(trade).await
        }

        async fn update(&self, trade: &Trade) -> Result<()> {
            self.0.update(trade).await
        }

        async fn get(&self, id: TradeId) -> Result<Trade> {
            self.0.get(id).await
        }

        async fn list(&self) -> Result<Vec<Trade>> {
            self.0.list().await
        }

        async fn claim_for_close(&self, id: TradeId) -> Result<Trade> {
            self.0.claim_for_close(id).await
        }

        async fn release_claim(&self, _id: TradeId) -> Result<()> {
            Err(Error::Storage("write failed".into()))
        }
    }

    fn setup() -> (TradeExecutor, Arc<PaperExchange>, Arc<InMemoryTradeStore>) {
        let exchange = Arc::new(PaperExchange::new(1_000_000));
        exchange.set_book("T", &[[40, 100]], &[[55, 100]]);
        let store = Arc::new(InMemoryTradeStore::new());
        let executor = TradeExecutor::new(
            exchange.clone(),
            exchange.clone(),
            store.clone(),
            Arc::new(ResilientCaller::with_defaults()),
            ExecutorConfig::default(),
        );
        (executor, exchange, store)
    }

    fn request(contracts: u32) -> TradeRequest {
        TradeRequest {
            ticker: "T".into(),
            direction: Side::Yes,
            strike: 100_000.0,
            contracts,
            order_type: OrderType::Market,
            limit_price_cents: None,
        }
    }

    #[tokio::test]
    async fn test_execute_trade_opens_position() {
        let (executor, _, _) = setup();
        let response = executor.execute_trade(request(10)).await;

        assert!(response.success, "{:?}", response.error);
        assert_eq!(response.status, Some(TradeStatus::Open));
        assert_eq!(response.filled, 10);
        assert_eq!(response.price, Some(dec!(0.45)));
        assert_eq!(response.cost, Some(dec!(4.50)));
        let client_order_id = response.client_order_id.unwrap();
        assert!(client_order_id.starts_with("edge_"));
        assert_eq!(client_order_id.len(), "edge_".len() + 16);
    }

    #[tokio::test]
    async fn test_partial_and_zero_fills() {
        let (executor, exchange, _) = setup();
        exchange.set_book("T", &[[40, 100]], &[[55, 4]]);
        let response = executor.execute_trade(request(10)).await;
        assert_eq!(response.status, Some(TradeStatus::Partial));

        exchange.set_book("T", &[[40, 100]], &[]);
        let response = executor.execute_trade(request(10)).await;
        assert!(response.success);
        assert_eq!(response.status, Some(TradeStatus::Pending));
    }

    #[tokio::test]
    async fn test_rejection_cancels_with_verbatim_message() {
        let (executor, exchange, store) = setup();
        exchange.reject_next("market is closed for trading");
        let response = executor.execute_trade(request(1)).await;

        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("market is closed for trading"));
        assert_eq!(exchange.submissions(), 1);
        let trade = store.get(response.trade_id.unwrap()).await.unwrap();
        assert_eq!(trade.status, TradeStatus::Cancelled);
        assert_eq!(trade.error.as_deref(), Some("market is closed for trading"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_response_retried_without_double_fill() {
        let (executor, exchange, store) = setup();
        exchange.lose_next_responses(1);
        let response = executor.execute_trade(request(5)).await;

        assert!(response.success, "{:?}", response.error);
        assert_eq!(response.status, Some(TradeStatus::Open));
        assert_eq!(exchange.submissions(), 2);
        assert_eq!(exchange.orders().len(), 1);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_close_applies_fee_only_to_gains() {
        let (executor, exchange, store) = setup();
        let opened = executor.execute_trade(request(10)).await;
        let id = opened.trade_id.unwrap();

        // Yes bid moves to 60: gross (0.60 - 0.45) * 10 = 1.50
        exchange.set_book("T", &[[60, 100]], &[[35, 100]]);
        let closed = executor.close_position(id).await;
        assert!(closed.success, "{:?}", closed.error);
        let trade = store.get(id).await.unwrap();
        assert_eq!(trade.status, TradeStatus::Closed);
        assert_eq!(trade.fees, dec!(0.1050));
        assert_eq!(trade.pnl, Some(dec!(1.3950)));

        let opened = executor.execute_trade(request(10)).await;
        // Entry at 0.65 ask, exit at 0.60 bid: loss carries no fee
        let closed = executor.close_position(opened.trade_id.unwrap()).await;
        assert_eq!(closed.pnl, Some(dec!(-0.50)));
        let trade = store.get(opened.trade_id.unwrap()).await.unwrap();
        assert_eq!(trade.fees, Decimal::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_order_does_not_hold_up_other_submissions() {
        let (executor, exchange, _) = setup();
        exchange.rate_limit_next(Duration::from_secs(30));

        let throttled = tokio::spawn({
            let executor = executor.clone();
            async move { executor.execute_trade(request(1)).await }
        });
        while exchange.submissions() == 0 {
            tokio::task::yield_now().await;
        }

        let started = Instant::now();
        let response = executor.execute_trade(request(2)).await;
        assert!(response.success, "{:?}", response.error);
        assert!(started.elapsed() < Duration::from_secs(30));
        assert!(!throttled.is_finished());

        let throttled = throttled.await.unwrap();
        assert!(throttled.success, "{:?}", throttled.error);
        assert_eq!(exchange.orders().len(), 2);
    }

    #[tokio::test]
    async fn test_close_fill_without_price_leaves_position_open() {
        let (executor, exchange, store) = setup();
        let id = executor.execute_trade(request(10)).await.trade_id.unwrap();

        exchange.omit_next_fill_price();
        let response = executor.close_position(id).await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("without a price"));
        let trade = store.get(id).await.unwrap();
        assert_eq!(trade.status, TradeStatus::Open);
        assert_eq!(trade.pnl, None);

        let retried = executor.close_position(id).await;
        assert!(retried.success, "{:?}", retried.error);
        assert_eq!(retried.price, Some(dec!(0.40)));
    }

    #[tokio::test]
    async fn test_failed_claim_release_is_reported() {
        let exchange = Arc::new(PaperExchange::new(1_000_000));
        exchange.set_book("T", &[[40, 100]], &[[55, 100]]);
        let executor = TradeExecutor::new(
            exchange.clone(),
            exchange.clone(),
            Arc::new(StuckClaimStore(InMemoryTradeStore::new())),
            Arc::new(ResilientCaller::with_defaults()),
            ExecutorConfig::default(),
        );
        let id = executor.execute_trade(request(1)).await.trade_id.unwrap();

        exchange.reject_next("market closed");
        let response = executor.close_position(id).await;
        assert!(!response.success);
        let message = response.error.unwrap();
        assert!(message.starts_with("market closed"), "{message}");
        assert!(message.contains("close claim not released"), "{message}");
    }

    #[tokio::test]
    async fn test_close_requires_open_trade() {
        let (executor, exchange, _) = setup();
        exchange.set_book("T", &[[40, 100]], &[[55, 4]]);
        let partial = executor.execute_trade(request(10)).await;
        let response = executor.close_position(partial.trade_id.unwrap()).await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("PARTIAL"));

        let missing = executor.close_position(Uuid::new_v4()).await;
        assert!(missing.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_open_positions_degrade_when_book_unavailable() {
        let (executor, exchange, _) = setup();
        executor.execute_trade(request(2)).await;
        exchange.set_book("U", &[[40, 100]], &[[55, 100]]);
        executor
            .execute_trade(TradeRequest {
                ticker: "U".into(),
                ..request(2)
            })
            .await;
        exchange.make_book_unavailable("U");

        let positions = executor.get_open_positions().await.unwrap();
        assert_eq!(positions.len(), 2);
        let t = positions.iter().find(|p| p.ticker == "T").unwrap();
        assert_eq!(t.current_price, Some(dec!(0.40)));
        assert_eq!(t.unrealized_pnl, Some(dec!(-0.10)));
        let u = positions.iter().find(|p| p.ticker == "U").unwrap();
        assert_eq!(u.current_price, None);
        assert_eq!(u.unrealized_pnl, None);
    }

    #[tokio::test]
    async fn test_history_and_pnl_summary() {
        let (executor, exchange, _) = setup();
        let since = Utc::now();
        let first = executor.execute_trade(request(10)).await;
        exchange.set_book("T", &[[60, 100]], &[[35, 100]]);
        executor.close_position(first.trade_id.unwrap()).await;
        executor.execute_trade(request(1)).await;

        let history = executor.trade_history(10, 0).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(executor.trade_history(10, 1).await.unwrap().len(), 1);

        let summary = executor.pnl_summary(since).await.unwrap();
        assert_eq!(summary.trade_count, 1);
        assert_eq!(summary.wins, 1);
        assert_eq!(summary.win_rate, 1.0);
        assert_eq!(summary.total_pnl, dec!(1.3950));
    }

    #[tokio::test]
    async fn test_balance_and_cancel_passthrough() {
        let (executor, exchange, _) = setup();
        let opened = executor.execute_trade(request(10)).await;
        assert_eq!(executor.balance().await.unwrap().balance_cents, 1_000_000 - 450);

        let order_id = opened.order_id.unwrap();
        executor.cancel_order(&order_id).await.unwrap();
        assert!(exchange.is_cancelled(&order_id));
        assert!(executor.cancel_order("missing").await.is_err());
    }
}
