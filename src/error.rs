//! Error taxonomy shared by every outbound call and trading operation

use crate::resilience::ApiName;
use std::time::Duration;
use thiserror::Error;

/// Result alias for library operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the pipeline
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Network failure, timeout or 5xx from an upstream API
    #[error("{api} transient failure: {message}")]
    Transient { api: ApiName, message: String },

    /// Upstream returned 429
    #[error("{api} rate limited (retry after {retry_after:?})")]
    RateLimited {
        api: ApiName,
        retry_after: Option<Duration>,
    },

    /// Circuit breaker is open, no call was made
    #[error("{breaker} circuit open, service unavailable")]
    ServiceUnavailable { breaker: ApiName },

    /// Required market data could not be obtained or parsed
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Order API refused the order
    #[error("Order rejected: {0}")]
    ExecutionRejected(String),

    /// Unknown trade or record
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not valid for the current record state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Trade store failure
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Discriminant of [`Error`] for branching and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    RateLimited,
    ServiceUnavailable,
    DataUnavailable,
    ExecutionRejected,
    NotFound,
    InvalidState,
    Storage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transient { .. } => ErrorKind::Transient,
            Error::RateLimited { .. } => ErrorKind::RateLimited,
            Error::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
            Error::DataUnavailable(_) => ErrorKind::DataUnavailable,
            Error::ExecutionRejected(_) => ErrorKind::ExecutionRejected,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Stable label used in metrics and structured responses
    pub fn kind_label(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Transient => "transient",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::DataUnavailable => "data_unavailable",
            ErrorKind::ExecutionRejected => "execution_rejected",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Storage => "storage",
        }
    }

    /// Whether the retry loop may attempt the call again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient { .. } | Error::RateLimited { .. })
    }

    /// Whether the failure counts toward tripping a circuit breaker.
    ///
    /// Rate limiting is expected back-pressure and rejections are
    /// well-formed answers, so only transient failures count.
    pub fn counts_as_breaker_failure(&self) -> bool {
        matches!(self, Error::Transient { .. })
    }

    pub fn transient(api: ApiName, message: impl Into<String>) -> Self {
        Error::Transient {
            api,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        let err = Error::transient(ApiName::Coinbase, "timeout");
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert!(err.is_retryable());
        assert!(err.counts_as_breaker_failure());

        let err = Error::ServiceUnavailable {
            breaker: ApiName::Kalshi,
        };
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
        assert!(!err.is_retryable());
        assert!(!err.counts_as_breaker_failure());
    }

    #[test]
    fn test_rate_limited_is_not_breaker_failure() {
        let err = Error::RateLimited {
            api: ApiName::Binance,
            retry_after: Some(Duration::from_secs(2)),
        };
        assert!(err.is_retryable());
        assert!(!err.counts_as_breaker_failure());
    }

    #[test]
    fn test_rejection_message_preserved() {
        let err = Error::ExecutionRejected("insufficient balance".to_string());
        assert_eq!(err.to_string(), "Order rejected: insufficient balance");
    }
}
