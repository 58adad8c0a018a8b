//! Shared account ledger
//!
//! The ledger is the only state that capital-committing decisions contend on.
//! Every read that feeds a decision and every write goes through a
//! [`LedgerGuard`], which holds the ledger's single exclusive lock.

mod snapshot;

pub use snapshot::{AssetBalance, LedgerSnapshot, PositionView};

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{GateError, Result};
use crate::exchange::BalanceAuthority;

const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<String, AssetBalance>,
    positions: HashMap<String, PositionView>,
}

/// Lockable record of account balances and open positions
pub struct Ledger {
    state: Arc<Mutex<LedgerState>>,
    authority: Option<Arc<dyn BalanceAuthority>>,
    refresh_timeout: Duration,
    refreshes: Arc<AtomicU64>,
}

impl Ledger {
    /// Create a ledger seeded with balances
    pub fn new(balances: HashMap<String, AssetBalance>) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                balances,
                positions: HashMap::new(),
            })),
            authority: None,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            refreshes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Set the authoritative balance source used by `force_refresh`
    pub fn with_authority(mut self, authority: Arc<dyn BalanceAuthority>) -> Self {
        self.authority = Some(authority);
        self
    }

    pub fn with_refresh_timeout(mut self, refresh_timeout: Duration) -> Self {
        self.refresh_timeout = refresh_timeout;
        self
    }

    /// Acquire the exclusive lock. Released when the guard drops.
    pub async fn lock(&self) -> LedgerGuard {
        LedgerGuard {
            state: self.state.clone().lock_owned().await,
            authority: self.authority.clone(),
            refresh_timeout: self.refresh_timeout,
            refreshes: self.refreshes.clone(),
        }
    }

    /// Acquire the lock only if nobody holds it
    pub fn try_lock(&self) -> Option<LedgerGuard> {
        let state = self.state.clone().try_lock_owned().ok()?;
        Some(LedgerGuard {
            state,
            authority: self.authority.clone(),
            refresh_timeout: self.refresh_timeout,
            refreshes: self.refreshes.clone(),
        })
    }

    /// Snapshot taken under the lock
    pub async fn read_snapshot(&self) -> LedgerSnapshot {
        self.lock().await.snapshot()
    }

    /// Number of successful forced refreshes since creation
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }
}

/// Exclusive, scoped access to the ledger
pub struct LedgerGuard {
    state: OwnedMutexGuard<LedgerState>,
    authority: Option<Arc<dyn BalanceAuthority>>,
    refresh_timeout: Duration,
    refreshes: Arc<AtomicU64>,
}

impl LedgerGuard {
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            balances: self.state.balances.clone(),
            positions: self.state.positions.clone(),
        }
    }

    /// Add `delta` (possibly negative) to both available and total
    pub fn adjust_balance(&mut self, asset: &str, delta: Decimal) {
        self.apply_balance_delta(asset, delta, delta);
    }

    pub fn apply_balance_delta(&mut self, asset: &str, available: Decimal, total: Decimal) {
        let entry = self.state.balances.entry(asset.to_string()).or_default();
        entry.available += available;
        entry.total += total;
    }

    /// Add `delta` to the signed position on `symbol`, removing it once flat
    pub fn adjust_position(&mut self, symbol: &str, delta: Decimal, price: Decimal) {
        let flat = {
            let position = self
                .state
                .positions
                .entry(symbol.to_string())
                .or_insert_with(|| PositionView {
                    symbol: symbol.to_string(),
                    quantity: Decimal::ZERO,
                    entry_price: price,
                });
            let grows = position.quantity.is_zero()
                || position.quantity.is_sign_positive() == delta.is_sign_positive();
            if grows {
                let notional = position.quantity.abs() * position.entry_price + delta.abs() * price;
                let size = position.quantity.abs() + delta.abs();
                position.entry_price = notional / size;
            } else if delta.abs() > position.quantity.abs() {
                // Flipped through zero: the remainder opened at `price`
                position.entry_price = price;
            }
            position.quantity += delta;
            position.quantity.is_zero()
        };
        if flat {
            self.state.positions.remove(symbol);
        }
    }

    /// Replace balances with the authoritative ones.
    ///
    /// Positions are left untouched.
    pub async fn force_refresh(&mut self) -> Result<()> {
        let authority = self
            .authority
            .clone()
            .ok_or_else(|| GateError::LedgerRefresh("no balance authority configured".into()))?;

        let balances = timeout(self.refresh_timeout, authority.fetch_balances())
            .await
            .map_err(|_| {
                GateError::LedgerRefresh(format!(
                    "authority did not answer within {}ms",
                    self.refresh_timeout.as_millis()
                ))
            })?
            .map_err(|e| match e {
                GateError::LedgerRefresh(_) => e,
                other => GateError::LedgerRefresh(other.to_string()),
            })?;

        debug!("Ledger refresh received {} balances", balances.len());
        self.state.balances = balances;
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        info!("Ledger balances refreshed from authority");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    struct FixedAuthority(HashMap<String, AssetBalance>);

    #[async_trait]
    impl BalanceAuthority for FixedAuthority {
        async fn fetch_balances(&self) -> Result<HashMap<String, AssetBalance>> {
            Ok(self.0.clone())
        }
    }

    struct SlowAuthority;

    #[async_trait]
    impl BalanceAuthority for SlowAuthority {
        async fn fetch_balances(&self) -> Result<HashMap<String, AssetBalance>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(HashMap::new())
        }
    }

    fn seeded() -> HashMap<String, AssetBalance> {
        let mut balances = HashMap::new();
        balances.insert("USDT".to_string(), AssetBalance::free(dec!(100)));
        balances
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_and_released_on_drop() {
        let ledger = Ledger::new(seeded());
        let guard = ledger.lock().await;
        assert!(ledger.try_lock().is_none());
        drop(guard);
        assert!(ledger.try_lock().is_some());
    }

    #[tokio::test]
    async fn test_balance_mutations() {
        let ledger = Ledger::new(seeded());
        {
            let mut guard = ledger.lock().await;
            guard.adjust_balance("USDT", dec!(-40));
            guard.adjust_balance("BTC", dec!(0.001));
            guard.apply_balance_delta("USDT", dec!(-10), Decimal::ZERO);
        }
        let snap = ledger.read_snapshot().await;
        assert_eq!(snap.available_balance("USDT"), dec!(50));
        assert_eq!(snap.total_holdings("USDT"), dec!(60));
        assert_eq!(snap.available_balance("BTC"), dec!(0.001));
    }

    #[tokio::test]
    async fn test_position_adjustments() {
        let ledger = Ledger::new(HashMap::new());
        let mut guard = ledger.lock().await;
        guard.adjust_position("BTC/USDT:USDT", dec!(1), dec!(100));
        guard.adjust_position("BTC/USDT:USDT", dec!(1), dec!(200));
        let snap = guard.snapshot();
        let position = snap.open_position("BTC/USDT:USDT").unwrap();
        assert_eq!(position.quantity, dec!(2));
        assert_eq!(position.entry_price, dec!(150));

        guard.adjust_position("BTC/USDT:USDT", dec!(-2), dec!(180));
        assert!(guard.snapshot().open_position("BTC/USDT:USDT").is_none());
    }

    #[tokio::test]
    async fn test_position_flip_takes_fill_price() {
        let ledger = Ledger::new(HashMap::new());
        let mut guard = ledger.lock().await;
        guard.adjust_position("ETH/USDT:USDT", dec!(1), dec!(100));
        guard.adjust_position("ETH/USDT:USDT", dec!(-3), dec!(200));

        let snap = guard.snapshot();
        let position = snap.open_position("ETH/USDT:USDT").unwrap();
        assert_eq!(position.quantity, dec!(-2));
        assert_eq!(position.entry_price, dec!(200));

        // Partial reduce keeps the entry price
        guard.adjust_position("ETH/USDT:USDT", dec!(1), dec!(150));
        let snap = guard.snapshot();
        let position = snap.open_position("ETH/USDT:USDT").unwrap();
        assert_eq!(position.quantity, dec!(-1));
        assert_eq!(position.entry_price, dec!(200));
    }

    #[tokio::test]
    async fn test_force_refresh_replaces_balances() {
        let mut fresh = HashMap::new();
        fresh.insert("USDT".to_string(), AssetBalance::free(dec!(500)));
        let ledger = Ledger::new(seeded()).with_authority(Arc::new(FixedAuthority(fresh)));

        let mut guard = ledger.lock().await;
        guard.force_refresh().await.unwrap();
        assert_eq!(guard.snapshot().available_balance("USDT"), dec!(500));
        drop(guard);
        assert_eq!(ledger.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_without_authority_fails() {
        let ledger = Ledger::new(seeded());
        let mut guard = ledger.lock().await;
        let err = guard.force_refresh().await.unwrap_err();
        assert!(matches!(err, GateError::LedgerRefresh(_)));
        assert_eq!(guard.snapshot().available_balance("USDT"), dec!(100));
    }

    #[tokio::test]
    async fn test_force_refresh_times_out() {
        let ledger = Ledger::new(seeded())
            .with_authority(Arc::new(SlowAuthority))
            .with_refresh_timeout(Duration::from_millis(50));
        let mut guard = ledger.lock().await;
        let err = guard.force_refresh().await.unwrap_err();
        assert!(err.to_string().contains("50ms"));
        assert_eq!(ledger.refresh_count(), 0);
    }
}
