//! Signals command implementation

use super::format_signals;
use crate::context::AppContext;
use crate::feed::Asset;
use clap::Args;

#[derive(Args, Debug)]
pub struct SignalsArgs {
    /// Underlying asset
    #[arg(short, long, value_enum, default_value = "btc")]
    pub asset: Asset,

    /// Print the full analysis as JSON
    #[arg(long)]
    pub json: bool,
}

impl SignalsArgs {
    pub async fn execute(&self, context: &AppContext) -> anyhow::Result<()> {
        let analysis = context.signals().analyze(self.asset).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&analysis)?);
            return Ok(());
        }

        println!(
            "{} spot {:.2}  vol {:.1}% ({:?}{})  regime {:?}",
            analysis.asset,
            analysis.spot,
            analysis.volatility.pricing.value * 100.0,
            analysis.volatility.pricing.method,
            if analysis.candles_stale { ", stale candles" } else { "" },
            analysis.volatility.regime,
        );
        match analysis.expiry {
            Some(expiry) => println!(
                "Expiry {}  ({} contracts considered)\n",
                expiry.format("%Y-%m-%d %H:%M UTC"),
                analysis.contracts_considered
            ),
            None => println!("No live contracts\n"),
        }
        print!("{}", format_signals(&analysis.signals));
        Ok(())
    }
}
