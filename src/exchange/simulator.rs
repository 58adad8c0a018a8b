//! In-process exchange for paper trading and backtests
//!
//! Serves market limits and reference prices from its own market table, acts
//! as the balance authority for the ledger, and fills market orders
//! immediately at the reference price. Fees are not modelled.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{DirectionalState, DispatchRequest, MarketLimits, Order, OrderSide, Symbol};
use crate::error::{DispatchError, GateError, Result};
use crate::ledger::{AssetBalance, LedgerGuard, LedgerSnapshot};

use super::traits::{BalanceAuthority, MarketStatusProvider, OrderDispatcher, PriceProvider, TradingMode};

/// Leverage used when none is configured
pub const DEFAULT_SYMBOL_LEVERAGE: Decimal = Decimal::ONE;

/// Share of the usable balance committed by a non-"very" state without a note
const PARTIAL_ORDER_WEIGHT: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

const AMOUNT_DECIMALS: u32 = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedMarket {
    pub limits: MarketLimits,
    pub price: Decimal,
    /// Inactive markets reject every order
    pub active: bool,
}

/// One balance movement, applied to both the ledger and the exchange account
#[derive(Debug, Clone, PartialEq)]
struct BalanceChange {
    asset: String,
    available: Decimal,
    total: Decimal,
}

impl BalanceChange {
    fn both(asset: &str, delta: Decimal) -> Self {
        Self {
            asset: asset.to_string(),
            available: delta,
            total: delta,
        }
    }

    fn available_only(asset: &str, delta: Decimal) -> Self {
        Self {
            asset: asset.to_string(),
            available: delta,
            total: Decimal::ZERO,
        }
    }
}

pub struct SimulatedExchange {
    name: String,
    mode: TradingMode,
    leverage: Decimal,
    markets: RwLock<HashMap<String, SimulatedMarket>>,
    account: RwLock<HashMap<String, AssetBalance>>,
}

impl SimulatedExchange {
    pub fn new(name: impl Into<String>, mode: TradingMode) -> Self {
        Self {
            name: name.into(),
            mode,
            leverage: DEFAULT_SYMBOL_LEVERAGE,
            markets: RwLock::new(HashMap::new()),
            account: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_leverage(mut self, leverage: Decimal) -> Self {
        self.leverage = leverage.max(Decimal::ONE);
        self
    }

    pub fn with_market(mut self, symbol: &str, limits: MarketLimits, price: Decimal) -> Self {
        self.markets.get_mut().insert(
            symbol.to_string(),
            SimulatedMarket {
                limits,
                price,
                active: true,
            },
        );
        self
    }

    pub fn with_balance(mut self, asset: &str, amount: Decimal) -> Self {
        self.account
            .get_mut()
            .insert(asset.to_string(), AssetBalance::free(amount));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> TradingMode {
        self.mode
    }

    pub fn leverage(&self) -> Decimal {
        self.leverage
    }

    /// Current exchange-side balances, for seeding a ledger
    pub async fn balances(&self) -> HashMap<String, AssetBalance> {
        self.account.read().await.clone()
    }

    pub async fn set_market_active(&self, symbol: &str, active: bool) -> Result<()> {
        let mut markets = self.markets.write().await;
        let market = markets
            .get_mut(symbol)
            .ok_or_else(|| GateError::UnknownSymbol(symbol.to_string()))?;
        market.active = active;
        Ok(())
    }

    /// Credit the exchange account without telling any ledger
    pub async fn deposit(&self, asset: &str, amount: Decimal) {
        let mut account = self.account.write().await;
        let entry = account.entry(asset.to_string()).or_default();
        entry.available += amount;
        entry.total += amount;
    }

    async fn market(&self, symbol: &str) -> Result<SimulatedMarket> {
        self.markets
            .read()
            .await
            .get(symbol)
            .cloned()
            .ok_or_else(|| GateError::UnknownSymbol(symbol.to_string()))
    }

    /// Order size when the payload does not carry one.
    ///
    /// A nonzero final note weights the usable balance by its strength,
    /// otherwise the state decides between all of it and half.
    fn default_amount(
        &self,
        request: &DispatchRequest,
        pair: &Symbol,
        price: Decimal,
        snapshot: &LedgerSnapshot,
    ) -> Decimal {
        let strength = request.strength();
        let weight = if !strength.is_zero() {
            strength
        } else if matches!(
            request.state,
            DirectionalState::VeryLong | DirectionalState::VeryShort
        ) {
            Decimal::ONE
        } else {
            PARTIAL_ORDER_WEIGHT
        };
        let amount = match (self.mode, request.side) {
            (TradingMode::Future, _) => {
                snapshot.available_balance(pair.settlement()) * self.leverage / price
            }
            (TradingMode::Spot, OrderSide::Sell) => snapshot.available_balance(pair.base()),
            (TradingMode::Spot, OrderSide::Buy) => snapshot.available_balance(pair.quote()) / price,
        };
        (amount * weight).round_dp_with_strategy(
            AMOUNT_DECIMALS,
            rust_decimal::RoundingStrategy::ToZero,
        )
    }

    fn spot_changes(
        &self,
        pair: &Symbol,
        side: OrderSide,
        amount: Decimal,
        price: Decimal,
        snapshot: &LedgerSnapshot,
    ) -> std::result::Result<Vec<BalanceChange>, DispatchError> {
        let cost = amount * price;
        match side {
            OrderSide::Buy => {
                let available = snapshot.available_balance(pair.quote());
                if available < cost {
                    return Err(DispatchError::InsufficientFunds(format!(
                        "need {} {}, have {}",
                        cost,
                        pair.quote(),
                        available
                    )));
                }
                Ok(vec![
                    BalanceChange::both(pair.quote(), -cost),
                    BalanceChange::both(pair.base(), amount),
                ])
            }
            OrderSide::Sell => {
                let available = snapshot.available_balance(pair.base());
                if available < amount {
                    return Err(DispatchError::InsufficientFunds(format!(
                        "need {} {}, have {}",
                        amount,
                        pair.base(),
                        available
                    )));
                }
                Ok(vec![
                    BalanceChange::both(pair.base(), -amount),
                    BalanceChange::both(pair.quote(), cost),
                ])
            }
        }
    }

    /// Margin movements for a leveraged fill. Closing an opposite position
    /// frees its margin; only the opening remainder needs new margin.
    fn future_changes(
        &self,
        symbol: &str,
        pair: &Symbol,
        side: OrderSide,
        amount: Decimal,
        price: Decimal,
        snapshot: &LedgerSnapshot,
    ) -> std::result::Result<Vec<BalanceChange>, DispatchError> {
        let settlement = pair.settlement();
        let (holding, entry_price) = snapshot
            .open_position(symbol)
            .map(|p| (p.quantity, p.entry_price))
            .unwrap_or((Decimal::ZERO, price));

        let against = match side {
            OrderSide::Buy => holding < Decimal::ZERO,
            OrderSide::Sell => holding > Decimal::ZERO,
        };
        let closing = if against {
            amount.min(holding.abs())
        } else {
            Decimal::ZERO
        };
        let opening = amount - closing;

        let released = closing * entry_price / self.leverage;
        let required = opening * price / self.leverage;
        let available = snapshot.available_balance(settlement) + released;
        if available < required {
            return Err(DispatchError::InsufficientFunds(format!(
                "need {} {} margin, have {}",
                required, settlement, available
            )));
        }

        Ok(vec![BalanceChange::available_only(
            settlement,
            released - required,
        )])
    }

    async fn commit(&self, ledger: &mut LedgerGuard, changes: &[BalanceChange]) {
        let mut account = self.account.write().await;
        for change in changes {
            ledger.apply_balance_delta(&change.asset, change.available, change.total);
            let entry = account.entry(change.asset.clone()).or_default();
            entry.available += change.available;
            entry.total += change.total;
        }
    }
}

#[async_trait]
impl MarketStatusProvider for SimulatedExchange {
    async fn get_limits(&self, symbol: &str) -> Result<MarketLimits> {
        Ok(self.market(symbol).await?.limits)
    }
}

#[async_trait]
impl PriceProvider for SimulatedExchange {
    async fn reference_price(&self, symbol: &str) -> Result<Decimal> {
        Ok(self.market(symbol).await?.price)
    }
}

#[async_trait]
impl BalanceAuthority for SimulatedExchange {
    async fn fetch_balances(&self) -> Result<HashMap<String, AssetBalance>> {
        Ok(self.balances().await)
    }
}

#[async_trait]
impl OrderDispatcher for SimulatedExchange {
    async fn dispatch(
        &self,
        request: &DispatchRequest,
        ledger: &mut LedgerGuard,
    ) -> std::result::Result<Vec<Order>, DispatchError> {
        let market = self.market(&request.symbol).await?;
        if !market.active {
            return Err(DispatchError::OrderRejected(format!(
                "{} is not trading on {}",
                request.symbol, self.name
            )));
        }

        let pair: Symbol = request.symbol.parse()?;
        let snapshot = ledger.snapshot();
        let price = market.price;
        let amount = request
            .requested_amount()
            .unwrap_or_else(|| self.default_amount(request, &pair, price, &snapshot));

        if amount <= Decimal::ZERO
            || amount < market.limits.min_amount()
            || amount * price < market.limits.min_cost()
        {
            return Err(DispatchError::MinimalVolumeNotMet(format!(
                "{} {} @ {} is below the {} minimum",
                amount, pair.base(), price, request.symbol
            )));
        }

        let changes = match self.mode {
            TradingMode::Spot => self.spot_changes(&pair, request.side, amount, price, &snapshot)?,
            TradingMode::Future => self.future_changes(
                &request.symbol,
                &pair,
                request.side,
                amount,
                price,
                &snapshot,
            )?,
        };

        self.commit(ledger, &changes).await;
        if self.mode.is_leveraged() {
            let signed = match request.side {
                OrderSide::Buy => amount,
                OrderSide::Sell => -amount,
            };
            ledger.adjust_position(&request.symbol, signed, price);
        }

        debug!(
            "{} filled {} {} {} @ {}",
            self.name, request.side, amount, request.symbol, price
        );
        Ok(vec![Order::filled_market(
            &request.symbol,
            request.side,
            amount,
            price,
        )])
    }
}
