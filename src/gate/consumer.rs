use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::domain::Signal;

use super::coordinator::OrderCreationCoordinator;
use super::outcome::{DispatchOutcome, FailureKind};

/// Running outcome counters
#[derive(Debug, Default)]
pub struct ConsumerStats {
    signals: AtomicU64,
    created: AtomicU64,
    orders: AtomicU64,
    empty: AtomicU64,
    minimal_volume: AtomicU64,
    rejected: AtomicU64,
    insufficient_funds: AtomicU64,
    unknown_symbol: AtomicU64,
    unexpected: AtomicU64,
}

impl ConsumerStats {
    pub fn record(&self, outcome: &DispatchOutcome) {
        self.signals.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            DispatchOutcome::Created(orders) => {
                self.orders.fetch_add(orders.len() as u64, Ordering::Relaxed);
                &self.created
            }
            DispatchOutcome::Empty => &self.empty,
            DispatchOutcome::Failed(FailureKind::MinimalVolumeNotMet) => &self.minimal_volume,
            DispatchOutcome::Failed(FailureKind::OrderRejected) => &self.rejected,
            DispatchOutcome::Failed(FailureKind::InsufficientFundsAfterRetry) => {
                &self.insufficient_funds
            }
            DispatchOutcome::Failed(FailureKind::UnknownSymbol) => &self.unknown_symbol,
            DispatchOutcome::Failed(FailureKind::Unexpected) => &self.unexpected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> ConsumerSummary {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        ConsumerSummary {
            signals: load(&self.signals),
            created: load(&self.created),
            orders: load(&self.orders),
            empty: load(&self.empty),
            minimal_volume: load(&self.minimal_volume),
            rejected: load(&self.rejected),
            insufficient_funds: load(&self.insufficient_funds),
            unknown_symbol: load(&self.unknown_symbol),
            unexpected: load(&self.unexpected),
        }
    }
}

/// Point-in-time copy of [`ConsumerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ConsumerSummary {
    pub signals: u64,
    pub created: u64,
    pub orders: u64,
    pub empty: u64,
    pub minimal_volume: u64,
    pub rejected: u64,
    pub insufficient_funds: u64,
    pub unknown_symbol: u64,
    pub unexpected: u64,
}

impl ConsumerSummary {
    pub fn failed(&self) -> u64 {
        self.minimal_volume
            + self.rejected
            + self.insufficient_funds
            + self.unknown_symbol
            + self.unexpected
    }
}

impl std::fmt::Display for ConsumerSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Signals: {} | Created: {} ({} orders) | Empty: {} | Failed: {} (min volume {}, rejected {}, funds {}, unknown {}, unexpected {})",
            self.signals,
            self.created,
            self.orders,
            self.empty,
            self.failed(),
            self.minimal_volume,
            self.rejected,
            self.insufficient_funds,
            self.unknown_symbol,
            self.unexpected
        )
    }
}

/// Feeds signals from a channel into the coordinator.
///
/// Each signal runs as its own task, so signals for different symbols only
/// contend on the ledger lock.
pub struct SignalConsumer {
    coordinator: Arc<OrderCreationCoordinator>,
    stats: Arc<ConsumerStats>,
}

impl SignalConsumer {
    pub fn new(coordinator: Arc<OrderCreationCoordinator>) -> Self {
        Self {
            coordinator,
            stats: Arc::new(ConsumerStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<ConsumerStats> {
        self.stats.clone()
    }

    /// Consume until the channel closes and in-flight attempts finish
    pub async fn run(self, mut rx: mpsc::Receiver<Signal>) -> ConsumerSummary {
        info!(
            "Signal consumer started on {}",
            self.coordinator.exchange_name()
        );
        let mut in_flight = JoinSet::new();

        while let Some(signal) = rx.recv().await {
            let coordinator = self.coordinator.clone();
            let stats = self.stats.clone();
            in_flight.spawn(async move {
                let outcome = coordinator.attempt(&signal).await;
                stats.record(&outcome);
            });

            while let Some(joined) = in_flight.try_join_next() {
                if let Err(e) = joined {
                    error!("Order attempt task failed: {}", e);
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!("Order attempt task failed: {}", e);
            }
        }

        let summary = self.stats.summary();
        info!("Signal consumer stopped. {}", summary);
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Order, OrderSide};
    use rust_decimal_macros::dec;

    #[test]
    fn test_stats_count_each_outcome() {
        let stats = ConsumerStats::default();
        let orders = vec![
            Order::filled_market("BTC/USDT", OrderSide::Buy, dec!(1), dec!(1)),
            Order::filled_market("BTC/USDT", OrderSide::Buy, dec!(1), dec!(1)),
        ];
        stats.record(&DispatchOutcome::Created(orders));
        stats.record(&DispatchOutcome::Empty);
        stats.record(&DispatchOutcome::Failed(FailureKind::OrderRejected));
        stats.record(&DispatchOutcome::Failed(FailureKind::UnknownSymbol));

        let summary = stats.summary();
        assert_eq!(summary.signals, 4);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.orders, 2);
        assert_eq!(summary.empty, 1);
        assert_eq!(summary.failed(), 2);
        assert!(summary.to_string().contains("Created: 1 (2 orders)"));
    }
}
