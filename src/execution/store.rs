//! Trade persistence

use super::{Trade, TradeId, TradeStatus};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Storage for trade records
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Insert a new trade. Fails if its client order id is already recorded.
    async fn insert(&self, trade: &Trade) -> Result<()>;
    /// Replace a stored trade
    async fn update(&self, trade: &Trade) -> Result<()>;
    async fn get(&self, id: TradeId) -> Result<Trade>;
    async fn list(&self) -> Result<Vec<Trade>>;
    /// Atomically check the trade is `Open` and not already being closed,
    /// and mark it as being closed
    async fn claim_for_close(&self, id: TradeId) -> Result<Trade>;
    /// Drop a close claim after a failed close
    async fn release_claim(&self, id: TradeId) -> Result<()>;
}

#[derive(Default)]
struct StoreState {
    trades: HashMap<TradeId, Trade>,
    client_order_ids: HashSet<String>,
    closing: HashSet<TradeId>,
}

/// Process-local trade store
#[derive(Default)]
pub struct InMemoryTradeStore {
    state: Mutex<StoreState>,
}

impl InMemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TradeStore for InMemoryTradeStore {
    async fn insert(&self, trade: &Trade) -> Result<()> {
        let mut state = self.state.lock();
        if !state.client_order_ids.insert(trade.client_order_id.clone()) {
            return Err(Error::InvalidState(format!(
                "client order id {} already recorded",
                trade.client_order_id
            )));
        }
        state.trades.insert(trade.id, trade.clone());
        Ok(())
    }

    async fn update(&self, trade: &Trade) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match state.trades.get_mut(&trade.id) {
            Some(stored) => {
                *stored = trade.clone();
                if trade.status != TradeStatus::Open {
                    state.closing.remove(&trade.id);
                }
                Ok(())
            }
            None => Err(Error::NotFound(format!("trade {}", trade.id))),
        }
    }

    async fn get(&self, id: TradeId) -> Result<Trade> {
        self.state
            .lock()
            .trades
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("trade {id}")))
    }

    async fn list(&self) -> Result<Vec<Trade>> {
        Ok(self.state.lock().trades.values().cloned().collect())
    }

    async fn claim_for_close(&self, id: TradeId) -> Result<Trade> {
        let mut state = self.state.lock();
        let trade = state
            .trades
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("trade {id}")))?;
        if trade.status != TradeStatus::Open {
            return Err(Error::InvalidState(format!(
                "Trade is not open (status: {})",
                trade.status
            )));
        }
        if !state.closing.insert(id) {
            return Err(Error::InvalidState("Trade is already being closed".into()));
        }
        Ok(trade)
    }

    async fn release_claim(&self, id: TradeId) -> Result<()> {
        self.state.lock().closing.remove(&id);
        Ok(())
    }
}
