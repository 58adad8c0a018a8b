use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-symbol publication guards.
///
/// Serializes signal handling for one symbol inside the gate. Different
/// symbols never block each other here; the ledger lock orders them.
#[derive(Clone, Default)]
pub struct SymbolGuards {
    guards: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl SymbolGuards {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, symbol: &str) -> Arc<Mutex<()>> {
        // Clone out of the map so no shard lock is held across an await
        self.guards
            .entry(symbol.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Wait for the guard of `symbol`
    pub async fn acquire(&self, symbol: &str) -> PublicationGuard {
        let permit = self.slot(symbol).lock_owned().await;
        PublicationGuard { _permit: permit }
    }

    /// Take the guard only if it is free
    pub fn try_acquire(&self, symbol: &str) -> Option<PublicationGuard> {
        let permit = self.slot(symbol).try_lock_owned().ok()?;
        Some(PublicationGuard { _permit: permit })
    }

    pub fn is_held(&self, symbol: &str) -> bool {
        self.guards
            .get(symbol)
            .map(|slot| slot.try_lock().is_err())
            .unwrap_or(false)
    }
}

/// Held publication guard for one symbol; released on drop
pub struct PublicationGuard {
    _permit: OwnedMutexGuard<()>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_guard_serializes_same_symbol() {
        let guards = SymbolGuards::new();
        let held = guards.acquire("BTC/USDT").await;
        assert!(guards.is_held("BTC/USDT"));
        assert!(guards.try_acquire("BTC/USDT").is_none());

        let waiter = {
            let guards = guards.clone();
            tokio::spawn(async move {
                let _g = guards.acquire("BTC/USDT").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap();
        assert!(!guards.is_held("BTC/USDT"));
    }

    #[tokio::test]
    async fn test_guards_are_independent_per_symbol() {
        let guards = SymbolGuards::new();
        let _btc = guards.acquire("BTC/USDT").await;
        let eth = guards.try_acquire("ETH/USDT");
        assert!(eth.is_some());
        assert!(guards.is_held("ETH/USDT"));
        assert!(!guards.is_held("SOL/USDT"));
    }
}
