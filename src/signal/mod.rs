//! Signal generation module
//!
//! Prices contracts against the market and ranks them by expected value

mod engine;
mod types;

pub use engine::{EngineConfig, MispricingEngine};
pub use types::{MispricingClass, Side, Signal, TradeAction};
