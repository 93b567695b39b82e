//! Watch command implementation

use super::format_signals;
use crate::context::AppContext;
use crate::feed::Asset;
use crate::market::stream::{subscribe, StreamEvent};
use clap::Args;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Underlying asset
    #[arg(short, long, value_enum, default_value = "btc")]
    pub asset: Asset,

    /// Seconds between passes
    #[arg(short, long, default_value_t = 30)]
    pub interval: u64,
}

impl WatchArgs {
    pub async fn execute(&self, context: &AppContext) -> anyhow::Result<()> {
        let every = Duration::from_secs(self.interval.max(1));
        let mut events = subscribe(context.signals().clone(), self.asset, every);
        tracing::info!(asset = %self.asset, interval_secs = every.as_secs(), "Watching signals");

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = events.recv() => match event {
                    Some(StreamEvent::Analysis(analysis)) => {
                        println!(
                            "\n[{}] {} spot {:.2}  vol {:.1}%",
                            analysis.generated_at.format("%H:%M:%S"),
                            analysis.asset,
                            analysis.spot,
                            analysis.volatility.pricing.value * 100.0
                        );
                        print!("{}", format_signals(&analysis.signals));
                    }
                    Some(StreamEvent::Error(message)) => eprintln!("Pass failed: {message}"),
                    None => break,
                },
            }
        }

        tracing::info!("Watch stopped");
        Ok(())
    }
}
