//! Shared fixtures

use async_trait::async_trait;
use binary_edge::config::Config;
use binary_edge::context::AppContext;
use binary_edge::execution::PaperExchange;
use binary_edge::feed::{Asset, Candle, PriceSource};
use binary_edge::kalshi::ListedMarket;
use binary_edge::resilience::ApiName;
use binary_edge::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const NEAR_ITM: &str = "KXBTCD-26JAN0117-T98000";
pub const ATM: &str = "KXBTCD-26JAN0117-T100000";
pub const FAR_OTM: &str = "KXBTCD-26JAN0117-T110000";

/// Price source whose spot and candle endpoints can be taken down
pub struct FlakySource {
    pub api: ApiName,
    pub spot: f64,
    pub candles: Vec<Candle>,
    pub spot_down: AtomicBool,
    pub candles_down: AtomicBool,
    pub calls: AtomicU32,
}

impl FlakySource {
    pub fn new(api: ApiName, spot: f64) -> Self {
        Self {
            api,
            spot,
            candles: hourly_candles(spot, 48),
            spot_down: AtomicBool::new(false),
            candles_down: AtomicBool::new(false),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for FlakySource {
    fn api(&self) -> ApiName {
        self.api
    }

    async fn spot_price(&self, _asset: Asset) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.spot_down.load(Ordering::SeqCst) {
            return Err(Error::transient(self.api, "connection refused"));
        }
        Ok(self.spot)
    }

    async fn historical_candles(&self, _asset: Asset, _hours: usize) -> Result<Vec<Candle>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.candles_down.load(Ordering::SeqCst) {
            return Err(Error::transient(self.api, "504 gateway timeout"));
        }
        Ok(self.candles.clone())
    }
}

pub fn hourly_candles(around: f64, count: i64) -> Vec<Candle> {
    let start = Utc::now() - Duration::hours(count);
    (0..count)
        .map(|i| {
            let close = around * (1.0 + 0.002 * ((i % 7) as f64 - 3.0));
            Candle {
                timestamp: start + Duration::hours(i),
                open: close * 0.999,
                high: close * 1.003,
                low: close * 0.997,
                close,
                volume: 10.0,
            }
        })
        .collect()
}

fn listed(ticker: &str, expiry: DateTime<Utc>, yes_bid: i64, yes_ask: i64) -> ListedMarket {
    ListedMarket {
        ticker: ticker.into(),
        title: String::new(),
        status: "active".into(),
        close_time: Some(expiry),
        expiration_time: None,
        yes_bid: Some(yes_bid),
        yes_ask: Some(yes_ask),
        no_bid: Some(100 - yes_ask),
        no_ask: Some(100 - yes_bid),
    }
}

/// BTC contracts two hours out with matching books, plus a later expiry
pub fn btc_exchange() -> Arc<PaperExchange> {
    let exchange = Arc::new(PaperExchange::new(1_000_000));
    let soon = Utc::now() + Duration::hours(2);
    exchange.set_markets(
        "KXBTCD",
        vec![
            listed(NEAR_ITM, soon, 48, 50),
            listed(ATM, soon, 48, 52),
            listed(FAR_OTM, soon, 30, 32),
            listed("KXBTCD-26JAN0217-T100000", soon + Duration::hours(24), 48, 52),
        ],
    );
    exchange.set_book(NEAR_ITM, &[[48, 100]], &[[50, 100]]);
    exchange.set_book(ATM, &[[48, 100]], &[[48, 100]]);
    exchange.set_book(FAR_OTM, &[[30, 100]], &[[68, 100]]);
    exchange
}

pub fn paper_context(config: Config, source: Arc<FlakySource>, exchange: Arc<PaperExchange>) -> AppContext {
    AppContext::paper(config, vec![source as Arc<dyn PriceSource>], exchange).unwrap()
}

/// Answer from [`StubUpstream`] to one request
pub enum Reply {
    Json(u16, String),
    /// Read the request, then close the connection without answering
    Hangup,
}

/// One-request-per-connection HTTP server answering through a handler that
/// sees the raw request text
pub struct StubUpstream {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubUpstream {
    pub async fn start(mut handler: impl FnMut(&str) -> Reply + Send + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let request = read_request(&mut socket).await;
                let reply = handler(&request);
                seen.lock().push(request);
                if let Reply::Json(status, body) = reply {
                    let response = format!(
                        "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                }
            }
        });

        Self {
            base_url: format!("http://{addr}/trade-api/v2"),
            requests,
        }
    }

    /// Request lines received so far, e.g. `POST /trade-api/v2/portfolio/orders`
    pub fn request_lines(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|r| r.lines().next().unwrap_or_default().trim_end_matches(" HTTP/1.1").to_string())
            .collect()
    }
}

/// Body of a raw HTTP request
pub fn request_body(request: &str) -> &str {
    request.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or_default()
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
