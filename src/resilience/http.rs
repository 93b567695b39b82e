//! Mapping of HTTP outcomes onto the error taxonomy

use super::{parse_retry_after, ApiName};
use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

/// Kind of endpoint a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Market data reads
    Read,
    /// Order placement and cancellation
    Order,
}

/// Classify a non-success response.
///
/// 429 → `RateLimited` with the parsed `Retry-After`, 5xx → `Transient`,
/// any other status → `DataUnavailable` for reads or `ExecutionRejected`
/// for orders with the upstream message kept verbatim.
pub fn classify_response(
    api: ApiName,
    endpoint: Endpoint,
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
) -> Error {
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        return Error::RateLimited { api, retry_after };
    }
    if status.is_server_error() {
        return Error::transient(api, format!("HTTP {}", status.as_u16()));
    }
    match endpoint {
        Endpoint::Read => Error::DataUnavailable(format!("{api} HTTP {}: {body}", status.as_u16())),
        Endpoint::Order => Error::ExecutionRejected(rejection_message(body)),
    }
}

/// Send `request` and decode a JSON body, mapping failures onto [`Error`]
pub async fn send_json<T: DeserializeOwned>(
    api: ApiName,
    endpoint: Endpoint,
    request: RequestBuilder,
) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| classify_transport(api, &e))?;
    decode_json(api, endpoint, response).await
}

/// Send an order keyed by a client order id.
///
/// `Ok(None)` when the upstream answers 409: an order with the same key was
/// already accepted, typically by an attempt whose response was lost.
pub async fn send_idempotent_json<T: DeserializeOwned>(api: ApiName, request: RequestBuilder) -> Result<Option<T>> {
    let response = request
        .send()
        .await
        .map_err(|e| classify_transport(api, &e))?;
    if response.status() == StatusCode::CONFLICT {
        let body = response.text().await.unwrap_or_default();
        tracing::info!(api = %api, message = %rejection_message(&body), "Upstream reports duplicate order");
        return Ok(None);
    }
    decode_json(api, Endpoint::Order, response).await.map(Some)
}

async fn decode_json<T: DeserializeOwned>(api: ApiName, endpoint: Endpoint, response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        return Err(classify_response(api, endpoint, status, &headers, &body));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| classify_transport(api, &e))
}

/// Classify a transport-level failure
pub fn classify_transport(api: ApiName, err: &reqwest::Error) -> Error {
    if err.is_decode() {
        return Error::DataUnavailable(format!("{api} response decode failed: {err}"));
    }
    // Timeouts, connect failures and resets are all worth retrying
    Error::transient(api, err.to_string())
}

/// Pull `error.message` out of a JSON error body, else use the raw body
fn rejection_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}
