//! CLI interface for binary-edge
//!
//! Provides subcommands for:
//! - `signals`: One pass of the pipeline, ranked signals printed
//! - `watch`: Re-run the pipeline on an interval
//! - `status`: Breaker and cache health
//! - `config`: Show the effective configuration

mod signals;
mod watch;

pub use signals::SignalsArgs;
pub use watch::WatchArgs;

use crate::signal::Signal;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "binary-edge")]
#[command(about = "Mispricing signals for short-dated crypto binary options")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rank signals for an asset
    Signals(SignalsArgs),
    /// Stream signals for an asset
    Watch(WatchArgs),
    /// Show breaker and cache health
    Status,
    /// Show the effective configuration
    Config,
}

/// One row per signal, best EV first
pub(crate) fn format_signals(signals: &[Signal]) -> String {
    let mut out = format!(
        "{:<28} {:>10} {:>7} {:>7} {:>8} {:>8} {:<8} {:>5}\n",
        "TICKER", "STRIKE", "MODEL", "MARKET", "EDGE", "EV", "ACTION", "CONF"
    );
    for s in signals {
        out.push_str(&format!(
            "{:<28} {:>10.2} {:>7.3} {:>7.3} {:>+8.3} {:>+8.3} {:<8} {:>5.2}{}\n",
            s.ticker,
            s.strike,
            s.model_probability,
            s.implied_probability,
            s.mispricing,
            s.expected_value,
            s.action.as_str(),
            s.confidence,
            if s.book_consistent { "" } else { "  (books disagree)" },
        ));
    }
    out
}
