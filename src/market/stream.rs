//! Polling signal subscription
//!
//! One task per subscriber re-runs the pipeline on a fixed interval and
//! pushes each result down a bounded channel. Dropping the receiver stops
//! the task at its next await point.

use super::{MarketAnalysis, SignalService};
use crate::feed::Asset;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 16;

/// One tick of a subscription
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Analysis(Box<MarketAnalysis>),
    /// The pass failed; the subscription keeps polling
    Error(String),
}

/// Poll `asset` every `every`, starting immediately.
///
/// Must be called from within a tokio runtime.
pub fn subscribe(service: Arc<SignalService>, asset: Asset, every: Duration) -> mpsc::Receiver<StreamEvent> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                _ = ticker.tick() => {}
            }

            let event = tokio::select! {
                _ = tx.closed() => break,
                result = service.analyze(asset) => match result {
                    Ok(analysis) => StreamEvent::Analysis(Box::new(analysis)),
                    Err(e) => {
                        warn!(asset = %asset, error = %e, "Signal pass failed");
                        StreamEvent::Error(e.to_string())
                    }
                },
            };

            if tx.send(event).await.is_err() {
                break;
            }
        }
        debug!(asset = %asset, "Signal subscription closed");
    });

    rx
}
