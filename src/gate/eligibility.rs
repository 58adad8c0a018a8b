//! Capital eligibility checks
//!
//! Decides, from a ledger snapshot taken under the ledger lock, whether the
//! account holds enough capital (spot) or margin (leveraged) to act on a
//! directional state. Performs no mutation; the only I/O is the read-only
//! market-limits and price lookups, each bounded by the lookup timeout.

use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use crate::domain::{DirectionalState, OrderSide, Symbol};
use crate::error::{GateError, Result};
use crate::exchange::{MarketStatusProvider, PositionSizer, PriceProvider, SizingRequest};
use crate::ledger::LedgerSnapshot;

/// Go/no-go for one signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityDecision {
    pub eligible: bool,
    /// Derived from the state alone, regardless of `eligible`
    pub side: OrderSide,
}

impl EligibilityDecision {
    fn new(eligible: bool, state: DirectionalState) -> Self {
        Self {
            eligible,
            side: state.side(),
        }
    }
}

/// Spot accounts trade held assets directly
#[derive(Debug, Clone, Copy, Default)]
pub struct SpotContext;

/// Leveraged accounts are bounded by margin and leverage
#[derive(Clone)]
pub struct LeveragedContext {
    pub leverage: Decimal,
    pub sizer: Arc<dyn PositionSizer>,
    pub prices: Arc<dyn PriceProvider>,
}

/// Account mode, fixed for the lifetime of an evaluator
#[derive(Clone)]
pub enum AccountContext {
    Spot(SpotContext),
    Leveraged(LeveragedContext),
}

pub struct EligibilityEvaluator {
    market_status: Arc<dyn MarketStatusProvider>,
    context: AccountContext,
    lookup_timeout: Duration,
}

impl EligibilityEvaluator {
    pub fn new(
        market_status: Arc<dyn MarketStatusProvider>,
        context: AccountContext,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            market_status,
            context,
            lookup_timeout,
        }
    }

    /// Decide whether `state` on `symbol` can be acted on given `snapshot`.
    ///
    /// Neutral and unhandled states are never eligible and skip every lookup.
    /// Lookup failures and timeouts are returned as errors, never as eligible.
    pub async fn evaluate(
        &self,
        symbol: &str,
        state: DirectionalState,
        snapshot: &LedgerSnapshot,
    ) -> Result<EligibilityDecision> {
        if !state.is_actionable() {
            return Ok(EligibilityDecision::new(false, state));
        }

        let pair: Symbol = symbol.parse()?;
        let limits = self
            .bounded("market limits", symbol, self.market_status.get_limits(symbol))
            .await?;
        let min_amount = limits.min_amount();

        let eligible = match &self.context {
            AccountContext::Leveraged(ctx) => {
                let reference_price = self
                    .bounded("reference price", symbol, ctx.prices.reference_price(symbol))
                    .await?;
                let request = SizingRequest {
                    symbol: symbol.to_string(),
                    side: state.side(),
                    reference_price,
                    holding: snapshot.position_quantity(symbol),
                    margin_quantity: snapshot.total_holdings(pair.settlement()),
                    leverage: ctx.leverage,
                };
                let max_order_size = ctx.sizer.max_order_size(&request)?;
                debug!(
                    "{} {}: max order size {} vs min amount {}",
                    symbol, request.side, max_order_size, min_amount
                );
                max_order_size > min_amount
            }
            AccountContext::Spot(_) if state.is_bearish() => {
                // Selling: need the base asset itself
                snapshot.available_balance(pair.base()) > min_amount
            }
            AccountContext::Spot(_) => {
                // Buying: need the quote asset to pay with
                snapshot.available_balance(pair.quote()) > limits.min_cost()
            }
        };

        Ok(EligibilityDecision::new(eligible, state))
    }

    async fn bounded<T>(
        &self,
        what: &str,
        symbol: &str,
        lookup: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        timeout(self.lookup_timeout, lookup)
            .await
            .map_err(|_| GateError::LookupTimeout {
                what: format!("{} for {}", what, symbol),
                timeout_ms: self.lookup_timeout.as_millis() as u64,
            })?
    }
}
