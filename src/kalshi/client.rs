//! Kalshi trade API REST client

use super::{Balance, MarketApi, MarketsPage, OrderAck, OrderAction, OrderApi, OrderRequest, OrderType};
use crate::error::{Error, Result};
use crate::orderbook::OrderBook;
use crate::resilience::{send_idempotent_json, send_json, ApiName, Endpoint};
use crate::signal::Side;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Url};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Production trade API base URL
pub const KALSHI_API_URL: &str = "https://api.elections.kalshi.com/trade-api/v2";
/// Demo environment base URL
pub const KALSHI_DEMO_API_URL: &str = "https://demo-api.kalshi.co/trade-api/v2";

/// Listing page size
const PAGE_LIMIT: &str = "1000";
/// Orders read when looking up a duplicate submission
const ORDER_LOOKUP_LIMIT: &str = "200";

/// Produces authentication headers for a request.
///
/// `path` is the URL path without query string, `timestamp_ms` the wall
/// clock in milliseconds the headers are issued at.
pub trait RequestSigner: Send + Sync {
    fn headers(&self, method: &Method, path: &str, timestamp_ms: i64) -> Result<Vec<(String, String)>>;
}

/// Client for the Kalshi trade API
pub struct KalshiClient {
    client: Client,
    base_url: String,
    signer: Option<Arc<dyn RequestSigner>>,
}

#[derive(Debug, Deserialize)]
struct OrderbookEnvelope {
    orderbook: RawOrderbook,
}

#[derive(Debug, Default, Deserialize)]
struct RawOrderbook {
    #[serde(default)]
    yes: Option<Vec<[i64; 2]>>,
    #[serde(default)]
    no: Option<Vec<[i64; 2]>>,
}

#[derive(Debug, Serialize)]
struct OrderPayload<'a> {
    ticker: &'a str,
    client_order_id: &'a str,
    side: Side,
    action: OrderAction,
    count: u32,
    #[serde(rename = "type")]
    order_type: OrderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    yes_price: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    no_price: Option<u32>,
}

impl<'a> From<&'a OrderRequest> for OrderPayload<'a> {
    fn from(order: &'a OrderRequest) -> Self {
        let limit = match order.order_type {
            OrderType::Limit => order.limit_price_cents,
            OrderType::Market => None,
        };
        Self {
            ticker: &order.ticker,
            client_order_id: &order.client_order_id,
            side: order.side,
            action: order.action,
            count: order.count,
            order_type: order.order_type,
            yes_price: limit.filter(|_| order.side == Side::Yes),
            no_price: limit.filter(|_| order.side == Side::No),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OrderEnvelope {
    order: RawOrder,
}

#[derive(Debug, Deserialize)]
struct OrdersEnvelope {
    #[serde(default)]
    orders: Vec<RawOrder>,
}

#[derive(Debug, Deserialize)]
struct RawOrder {
    order_id: String,
    #[serde(default)]
    client_order_id: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(default, alias = "fill_count")]
    filled_count: u32,
    #[serde(default)]
    avg_price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct BalanceEnvelope {
    balance: i64,
}

impl KalshiClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            signer: None,
        }
    }

    /// Sign every request with `signer`
    pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = format!("{}{}", self.base_url, path);
        let parsed = Url::parse(&url).map_err(|e| Error::InvalidState(format!("bad Kalshi URL {url}: {e}")))?;
        let mut builder = self.client.request(method.clone(), parsed.clone());
        if let Some(signer) = &self.signer {
            for (name, value) in signer.headers(&method, parsed.path(), Utc::now().timestamp_millis())? {
                builder = builder.header(name, value);
            }
        }
        Ok(builder)
    }

    /// The order already accepted under `order`'s client order id
    async fn existing_order(&self, order: &OrderRequest) -> Result<RawOrder> {
        let request = self
            .request(Method::GET, "/portfolio/orders")?
            .query(&[("ticker", order.ticker.as_str()), ("limit", ORDER_LOOKUP_LIMIT)]);
        let envelope: OrdersEnvelope = send_json(ApiName::Kalshi, Endpoint::Read, request).await?;
        envelope
            .orders
            .into_iter()
            .find(|o| o.client_order_id.as_deref() == Some(order.client_order_id.as_str()))
            .ok_or_else(|| {
                // Listed orders can lag the 409; the retry looks again
                Error::transient(
                    ApiName::Kalshi,
                    format!("duplicate order {} not yet listed", order.client_order_id),
                )
            })
    }
}

#[async_trait]
impl MarketApi for KalshiClient {
    async fn markets_page(&self, series: &str, cursor: Option<&str>) -> Result<MarketsPage> {
        let mut query = vec![("series_ticker", series), ("limit", PAGE_LIMIT)];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        tracing::debug!(series, cursor = ?cursor, "Fetching Kalshi markets page");
        let request = self.request(Method::GET, "/markets")?.query(&query);
        let mut page: MarketsPage = send_json(ApiName::Kalshi, Endpoint::Read, request).await?;
        page.cursor = page.cursor.filter(|c| !c.is_empty());
        Ok(page)
    }

    async fn orderbook(&self, ticker: &str) -> Result<OrderBook> {
        let request = self.request(Method::GET, &format!("/markets/{ticker}/orderbook"))?;
        let envelope: OrderbookEnvelope = send_json(ApiName::Kalshi, Endpoint::Read, request).await?;
        Ok(into_book(ticker, envelope.orderbook))
    }
}

fn into_book(ticker: &str, raw: RawOrderbook) -> OrderBook {
    OrderBook::from_bid_levels(
        ticker,
        raw.yes.as_deref().unwrap_or_default(),
        raw.no.as_deref().unwrap_or_default(),
    )
}

#[async_trait]
impl OrderApi for KalshiClient {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        let request = self
            .request(Method::POST, "/portfolio/orders")?
            .json(&OrderPayload::from(order));
        let raw = match send_idempotent_json::<OrderEnvelope>(ApiName::Kalshi, request).await? {
            Some(envelope) => envelope.order,
            None => {
                tracing::warn!(
                    client_order_id = %order.client_order_id,
                    "Order already submitted, using the existing order"
                );
                self.existing_order(order).await?
            }
        };
        tracing::info!(
            ticker = %order.ticker,
            client_order_id = %order.client_order_id,
            order_id = %raw.order_id,
            filled = raw.filled_count,
            status = %raw.status,
            "Order acknowledged"
        );
        Ok(OrderAck {
            order_id: raw.order_id,
            client_order_id: order.client_order_id.clone(),
            filled_count: raw.filled_count,
            avg_price_cents: raw.avg_price,
            status: raw.status,
        })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        let request = self.request(Method::DELETE, &format!("/portfolio/orders/{order_id}"))?;
        let _: serde_json::Value = send_json(ApiName::Kalshi, Endpoint::Order, request).await?;
        Ok(())
    }

    async fn balance(&self) -> Result<Balance> {
        let request = self.request(Method::GET, "/portfolio/balance")?;
        let envelope: BalanceEnvelope = send_json(ApiName::Kalshi, Endpoint::Read, request).await?;
        Ok(Balance {
            balance_cents: envelope.balance,
        })
    }
}
