//! Paper exchange
//!
//! In-process stand-in for the exchange: serves configured listings and
//! books, fills orders against the book and honours client order ids the
//! way the live API does, so a resubmitted order is never filled twice.
//! With an upstream attached, listings and books come from the live market
//! and only order entry is simulated.

use crate::error::{Error, Result};
use crate::kalshi::{
    Balance, ListedMarket, MarketApi, MarketsPage, OrderAck, OrderAction, OrderApi, OrderRequest, OrderType,
};
use crate::orderbook::OrderBook;
use crate::resilience::ApiName;
use crate::signal::Side;
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: usize = 100;

struct PaperState {
    markets: HashMap<String, Vec<ListedMarket>>,
    books: HashMap<String, OrderBook>,
    /// Acknowledgements by client order id
    orders: HashMap<String, OrderAck>,
    cancelled: HashSet<String>,
    balance_cents: i64,
    submissions: u32,
    lost_responses: u32,
    reject_next: Option<String>,
    rate_limit_next: Option<Duration>,
    unpriced_next: bool,
    unavailable_books: HashSet<String>,
    page_size: usize,
}

/// Simulated exchange with immediate fills at the top of the book
pub struct PaperExchange {
    state: Mutex<PaperState>,
    upstream: Option<Arc<dyn MarketApi>>,
}

impl PaperExchange {
    pub fn new(balance_cents: i64) -> Self {
        Self {
            state: Mutex::new(PaperState {
                markets: HashMap::new(),
                books: HashMap::new(),
                orders: HashMap::new(),
                cancelled: HashSet::new(),
                balance_cents,
                submissions: 0,
                lost_responses: 0,
                reject_next: None,
                rate_limit_next: None,
                unpriced_next: false,
                unavailable_books: HashSet::new(),
                page_size: DEFAULT_PAGE_SIZE,
            }),
            upstream: None,
        }
    }

    /// Read listings and books from `upstream`, filling orders against them
    pub fn with_market_data(mut self, upstream: Arc<dyn MarketApi>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    /// Listing served for `series`
    pub fn set_markets(&self, series: &str, markets: Vec<ListedMarket>) {
        self.state.lock().markets.insert(series.to_string(), markets);
    }

    pub fn set_page_size(&self, page_size: usize) {
        self.state.lock().page_size = page_size.max(1);
    }

    /// Book from resting `[price_cents, quantity]` bids on each side
    pub fn set_book(&self, ticker: &str, yes: &[[i64; 2]], no: &[[i64; 2]]) {
        let mut state = self.state.lock();
        state.unavailable_books.remove(ticker);
        state
            .books
            .insert(ticker.to_string(), OrderBook::from_bid_levels(ticker, yes, no));
    }

    /// Make book fetches for `ticker` fail
    pub fn make_book_unavailable(&self, ticker: &str) {
        self.state.lock().unavailable_books.insert(ticker.to_string());
    }

    /// Accept and record the next `count` orders but fail the call as if the
    /// connection dropped before the response arrived
    pub fn lose_next_responses(&self, count: u32) {
        self.state.lock().lost_responses = count;
    }

    /// Reject the next new order with `message`
    pub fn reject_next(&self, message: impl Into<String>) {
        self.state.lock().reject_next = Some(message.into());
    }

    /// Answer the next new order with a 429 carrying `retry_after`
    pub fn rate_limit_next(&self, retry_after: Duration) {
        self.state.lock().rate_limit_next = Some(retry_after);
    }

    /// Fill the next new order but leave the average price off its ack
    pub fn omit_next_fill_price(&self) {
        self.state.lock().unpriced_next = true;
    }

    /// Every `place_order` call received, duplicates included
    pub fn submissions(&self) -> u32 {
        self.state.lock().submissions
    }

    /// Distinct orders accepted
    pub fn orders(&self) -> Vec<OrderAck> {
        self.state.lock().orders.values().cloned().collect()
    }

    pub fn is_cancelled(&self, order_id: &str) -> bool {
        self.state.lock().cancelled.contains(order_id)
    }
}

impl PaperState {
    /// Top-of-book level an order would trade against, as (cents, size)
    fn touch(&self, order: &OrderRequest) -> Option<(Decimal, u32)> {
        let book = self.books.get(&order.ticker)?;
        let levels = match (order.action, order.side) {
            (OrderAction::Buy, Side::Yes) => &book.yes_asks,
            (OrderAction::Buy, Side::No) => &book.no_asks,
            (OrderAction::Sell, Side::Yes) => &book.yes_bids,
            (OrderAction::Sell, Side::No) => &book.no_bids,
        };
        let level = levels.first()?;
        let size = level.size.to_u32().unwrap_or(u32::MAX);
        Some((level.price * Decimal::ONE_HUNDRED, size))
    }

    fn fill(&mut self, order: &OrderRequest) -> Result<OrderAck> {
        let touch = self.touch(order).filter(|(cents, _)| match (order.order_type, order.limit_price_cents) {
            (OrderType::Limit, Some(limit)) => match order.action {
                OrderAction::Buy => *cents <= Decimal::from(limit),
                OrderAction::Sell => *cents >= Decimal::from(limit),
            },
            _ => true,
        });

        let (filled, price) = match touch {
            Some((cents, size)) => (order.count.min(size), Some(cents)),
            None => (0, None),
        };

        if let Some(cents) = price {
            let notional = cents * Decimal::from(filled);
            let notional = notional.round().to_i64().unwrap_or(i64::MAX);
            match order.action {
                OrderAction::Buy if notional > self.balance_cents => {
                    return Err(Error::ExecutionRejected("insufficient balance".into()));
                }
                OrderAction::Buy => self.balance_cents -= notional,
                OrderAction::Sell => self.balance_cents += notional,
            }
        }

        Ok(OrderAck {
            order_id: Uuid::new_v4().to_string(),
            client_order_id: order.client_order_id.clone(),
            filled_count: filled,
            avg_price_cents: price.filter(|_| filled > 0),
            status: if filled == order.count { "executed" } else { "resting" }.to_string(),
        })
    }
}

#[async_trait]
impl OrderApi for PaperExchange {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        if let Some(upstream) = &self.upstream {
            let known = self.state.lock().orders.contains_key(&order.client_order_id);
            if !known {
                let book = upstream.orderbook(&order.ticker).await?;
                self.state.lock().books.insert(order.ticker.clone(), book);
            }
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.submissions += 1;

        let ack = match state.orders.get(&order.client_order_id) {
            Some(existing) => {
                tracing::info!(client_order_id = %order.client_order_id, "Duplicate paper order, returning original");
                existing.clone()
            }
            None => {
                if let Some(retry_after) = state.rate_limit_next.take() {
                    return Err(Error::RateLimited {
                        api: ApiName::Kalshi,
                        retry_after: Some(retry_after),
                    });
                }
                if let Some(message) = state.reject_next.take() {
                    return Err(Error::ExecutionRejected(message));
                }
                let mut ack = state.fill(order)?;
                if std::mem::take(&mut state.unpriced_next) {
                    ack.avg_price_cents = None;
                }
                tracing::info!(
                    ticker = %order.ticker,
                    side = %order.side,
                    filled = ack.filled_count,
                    price_cents = ?ack.avg_price_cents,
                    "Paper order filled"
                );
                state.orders.insert(order.client_order_id.clone(), ack.clone());
                ack
            }
        };

        if state.lost_responses > 0 {
            state.lost_responses -= 1;
            return Err(Error::transient(ApiName::Kalshi, "connection reset after submit"));
        }
        Ok(ack)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        if !state.orders.values().any(|ack| ack.order_id == order_id) {
            return Err(Error::ExecutionRejected(format!("order {order_id} not found")));
        }
        state.cancelled.insert(order_id.to_string());
        tracing::info!(order_id, "Paper order cancelled");
        Ok(())
    }

    async fn balance(&self) -> Result<Balance> {
        Ok(Balance {
            balance_cents: self.state.lock().balance_cents,
        })
    }
}

#[async_trait]
impl MarketApi for PaperExchange {
    async fn markets_page(&self, series: &str, cursor: Option<&str>) -> Result<MarketsPage> {
        if let Some(upstream) = &self.upstream {
            return upstream.markets_page(series, cursor).await;
        }
        let state = self.state.lock();
        let all = state.markets.get(series).map(Vec::as_slice).unwrap_or_default();
        let start = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
        let end = (start + state.page_size).min(all.len());
        Ok(MarketsPage {
            markets: all.get(start..end).unwrap_or_default().to_vec(),
            cursor: (end < all.len()).then(|| end.to_string()),
        })
    }

    async fn orderbook(&self, ticker: &str) -> Result<OrderBook> {
        if let Some(upstream) = &self.upstream {
            let book = upstream.orderbook(ticker).await?;
            self.state.lock().books.insert(ticker.to_string(), book.clone());
            return Ok(book);
        }
        let state = self.state.lock();
        if state.unavailable_books.contains(ticker) {
            return Err(Error::DataUnavailable(format!("no book for {ticker}")));
        }
        Ok(state
            .books
            .get(ticker)
            .cloned()
            .unwrap_or_else(|| OrderBook::new(ticker)))
    }
}
