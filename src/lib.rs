//! binary-edge: mispricing signals for short-dated crypto binary options
//!
//! This library provides the core components for:
//! - Rate limiting, circuit breaking and bounded retry of every upstream call
//! - A stale-serving snapshot cache for candles
//! - Spot and candle feeds with source fallback, plus the DVOL index
//! - Realized volatility estimators and a digital option pricer
//! - Order book imbalance and the mispricing engine
//! - Trade execution with idempotent order submission
//! - Structured logging and Prometheus metrics

pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod execution;
pub mod feed;
pub mod kalshi;
pub mod market;
pub mod model;
pub mod orderbook;
pub mod resilience;
pub mod signal;
pub mod telemetry;

pub use error::{Error, ErrorKind, Result};
