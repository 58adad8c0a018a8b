//! Order creation coordinator
//!
//! Entry point for every incoming signal. For one signal it:
//! 1. takes the symbol's publication guard, then the ledger lock (always in that order)
//! 2. evaluates eligibility against a snapshot read under the lock
//! 3. dispatches, refreshing the ledger and retrying once on missing funds
//! 4. reports exactly one classified outcome
//!
//! Both guards are scoped values, so every exit path releases them.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::domain::{DirectionalState, DispatchRequest, Order, Signal};
use crate::error::DispatchError;
use crate::exchange::OrderDispatcher;
use crate::ledger::{Ledger, LedgerGuard};

use super::eligibility::EligibilityEvaluator;
use super::guard::SymbolGuards;
use super::outcome::{DispatchOutcome, FailureKind};

type DispatchResult = std::result::Result<Vec<Order>, DispatchError>;

pub struct OrderCreationCoordinator {
    exchange_name: String,
    ledger: Arc<Ledger>,
    guards: SymbolGuards,
    evaluator: EligibilityEvaluator,
    dispatcher: Arc<dyn OrderDispatcher>,
}

impl OrderCreationCoordinator {
    pub fn new(
        exchange_name: impl Into<String>,
        ledger: Arc<Ledger>,
        evaluator: EligibilityEvaluator,
        dispatcher: Arc<dyn OrderDispatcher>,
    ) -> Self {
        Self {
            exchange_name: exchange_name.into(),
            ledger,
            guards: SymbolGuards::new(),
            evaluator,
            dispatcher,
        }
    }

    pub fn guards(&self) -> &SymbolGuards {
        &self.guards
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn exchange_name(&self) -> &str {
        &self.exchange_name
    }

    /// Convert `signal` into zero or more orders.
    ///
    /// Never fails: every fault is logged and reported as an outcome.
    pub async fn attempt(&self, signal: &Signal) -> DispatchOutcome {
        let span = info_span!(
            "order_attempt",
            symbol = %signal.symbol,
            state = %signal.state,
            exchange = %self.exchange_name
        );
        async {
            debug!(
                "Entering order creation for {} on {}",
                signal.symbol, self.exchange_name
            );
            let outcome = match AssertUnwindSafe(self.attempt_guarded(signal))
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(panic) => {
                    // Guards were dropped while unwinding
                    error!(
                        symbol = %signal.symbol,
                        state = %signal.state,
                        "Collaborator panicked during order creation on {}: {}",
                        self.exchange_name,
                        panic_reason(panic.as_ref(), "collaborator panicked")
                    );
                    DispatchOutcome::Failed(FailureKind::Unexpected)
                }
            };
            debug!("Exiting order creation for {}: {}", signal.symbol, outcome);
            outcome
        }
        .instrument(span)
        .await
    }

    /// Same as [`attempt`](Self::attempt) for callers holding the parts of a signal
    pub async fn attempt_parts(
        &self,
        symbol: &str,
        state: DirectionalState,
        payload: serde_json::Value,
    ) -> DispatchOutcome {
        self.attempt(&Signal::new(symbol, state).with_payload(payload))
            .await
    }

    async fn attempt_guarded(&self, signal: &Signal) -> DispatchOutcome {
        let _publication = self.guards.acquire(&signal.symbol).await;
        let mut ledger = self.ledger.lock().await;

        let snapshot = ledger.snapshot();
        let decision = match self
            .evaluator
            .evaluate(&signal.symbol, signal.state, &snapshot)
            .await
        {
            Ok(decision) => decision,
            Err(e) if e.is_lookup_failure() => {
                warn!(
                    "Cannot evaluate order creation for {} on {}: {}",
                    signal.symbol, self.exchange_name, e
                );
                return DispatchOutcome::Failed(FailureKind::UnknownSymbol);
            }
            Err(e) => {
                error!(
                    symbol = %signal.symbol,
                    state = %signal.state,
                    error = ?e,
                    "Eligibility evaluation failed on {}: {}",
                    self.exchange_name,
                    e
                );
                return DispatchOutcome::Failed(FailureKind::Unexpected);
            }
        };

        if !decision.eligible {
            debug!(
                "Skipping order creation for {} on {}: not enough available funds or ineligible state",
                signal.symbol, self.exchange_name
            );
            return DispatchOutcome::Empty;
        }

        let request = DispatchRequest::new(signal, decision.side);
        let first = self.dispatch_once(&request, &mut ledger).await;

        let result = match first {
            Err(DispatchError::InsufficientFunds(reason)) => {
                info!(
                    "Missing funds for {} on {} ({}), refreshing ledger and retrying once",
                    request.symbol, self.exchange_name, reason
                );
                if let Err(e) = ledger.force_refresh().await {
                    error!(
                        symbol = %request.symbol,
                        error = ?e,
                        "Ledger refresh failed before retry on {}: {}",
                        self.exchange_name,
                        e
                    );
                    return DispatchOutcome::Failed(FailureKind::Unexpected);
                }
                match self.dispatch_once(&request, &mut ledger).await {
                    Err(DispatchError::InsufficientFunds(reason)) => {
                        error!(
                            "Failed to create order on second attempt for {} on {}: {}",
                            request.symbol, self.exchange_name, reason
                        );
                        return DispatchOutcome::Failed(FailureKind::InsufficientFundsAfterRetry);
                    }
                    retried => retried,
                }
            }
            other => other,
        };

        self.classify(&request, result)
    }

    /// One dispatcher call; a panic inside the dispatcher becomes `Unexpected`
    async fn dispatch_once(&self, request: &DispatchRequest, ledger: &mut LedgerGuard) -> DispatchResult {
        match AssertUnwindSafe(self.dispatcher.dispatch(request, ledger))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(DispatchError::Unexpected(panic_reason(
                panic.as_ref(),
                "dispatcher panicked",
            ))),
        }
    }

    fn classify(&self, request: &DispatchRequest, result: DispatchResult) -> DispatchOutcome {
        match result {
            Ok(orders) => {
                info!(
                    "Created {} order(s) for {} {} on {}",
                    orders.len(),
                    request.side,
                    request.symbol,
                    self.exchange_name
                );
                DispatchOutcome::Created(orders)
            }
            Err(DispatchError::MinimalVolumeNotMet(reason)) => {
                info!(
                    "Not enough funds to create a new order for {}: {} exchange minimal order volume has not been reached ({})",
                    request.symbol, self.exchange_name, reason
                );
                DispatchOutcome::Failed(FailureKind::MinimalVolumeNotMet)
            }
            Err(DispatchError::OrderRejected(reason)) => {
                info!(
                    "Failed order creation for {} on {}: order refused by the exchange ({})",
                    request.symbol, self.exchange_name, reason
                );
                DispatchOutcome::Failed(FailureKind::OrderRejected)
            }
            Err(DispatchError::InsufficientFunds(reason)) => {
                // Only reachable if a retry path forgot to map it
                error!(
                    "Missing funds for {} on {}: {}",
                    request.symbol, self.exchange_name, reason
                );
                DispatchOutcome::Failed(FailureKind::InsufficientFundsAfterRetry)
            }
            Err(DispatchError::Unexpected(reason)) => {
                error!(
                    symbol = %request.symbol,
                    state = %request.state,
                    side = %request.side,
                    final_note = %request.final_note,
                    payload = %request.payload,
                    "Error when creating order on {}: {}",
                    self.exchange_name,
                    reason
                );
                DispatchOutcome::Failed(FailureKind::Unexpected)
            }
        }
    }
}

fn panic_reason(panic: &(dyn Any + Send), fallback: &str) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| fallback.to_string())
}
