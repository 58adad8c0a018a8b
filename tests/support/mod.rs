//! Hand-written collaborators shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tradegate::domain::{DispatchRequest, MarketLimits, Order, OrderSide};
use tradegate::error::{DispatchError, GateError, Result};
use tradegate::exchange::{
    BalanceAuthority, MarketStatusProvider, OrderDispatcher, PositionSizer, PriceProvider,
    SizingRequest,
};
use tradegate::gate::{AccountContext, EligibilityEvaluator, OrderCreationCoordinator};
use tradegate::ledger::{AssetBalance, Ledger, LedgerGuard};

pub const LOOKUP_TIMEOUT: Duration = Duration::from_millis(500);

pub fn balances(entries: &[(&str, Decimal)]) -> HashMap<String, AssetBalance> {
    entries
        .iter()
        .map(|(asset, amount)| (asset.to_string(), AssetBalance::free(*amount)))
        .collect()
}

/// Market limits served from a fixed table; unknown symbols fail the lookup
#[derive(Default)]
pub struct StaticMarkets {
    limits: HashMap<String, MarketLimits>,
    pub lookups: AtomicUsize,
}

impl StaticMarkets {
    pub fn with(mut self, symbol: &str, min_amount: Option<Decimal>, min_cost: Option<Decimal>) -> Self {
        self.limits
            .insert(symbol.to_string(), MarketLimits::new(min_amount, min_cost));
        self
    }
}

#[async_trait]
impl MarketStatusProvider for StaticMarkets {
    async fn get_limits(&self, symbol: &str) -> Result<MarketLimits> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.limits
            .get(symbol)
            .cloned()
            .ok_or_else(|| GateError::UnknownSymbol(symbol.to_string()))
    }
}

pub struct FixedPrice(pub Decimal);

#[async_trait]
impl PriceProvider for FixedPrice {
    async fn reference_price(&self, _symbol: &str) -> Result<Decimal> {
        Ok(self.0)
    }
}

/// Position sizer returning a constant capacity
pub struct FixedSizer(pub Decimal);

impl PositionSizer for FixedSizer {
    fn max_order_size(&self, _request: &SizingRequest) -> Result<Decimal> {
        Ok(self.0)
    }
}

/// Dispatcher that replays scripted results and records every call.
///
/// Once the script runs out it fills one market order. Calls that overlap
/// in time are counted in `overlaps`.
#[derive(Default)]
pub struct ScriptedDispatcher {
    script: Mutex<VecDeque<std::result::Result<(), DispatchError>>>,
    sides: Mutex<Vec<OrderSide>>,
    pub calls: AtomicUsize,
    pub overlaps: AtomicUsize,
    busy: AtomicBool,
    hold: Option<Duration>,
}

impl ScriptedDispatcher {
    pub fn new(script: Vec<std::result::Result<(), DispatchError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    /// Sleep for `hold` inside every call
    pub fn holding(mut self, hold: Duration) -> Self {
        self.hold = Some(hold);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sides(&self) -> Vec<OrderSide> {
        self.sides.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderDispatcher for ScriptedDispatcher {
    async fn dispatch(
        &self,
        request: &DispatchRequest,
        _ledger: &mut LedgerGuard,
    ) -> std::result::Result<Vec<Order>, DispatchError> {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sides.lock().unwrap().push(request.side);
        if let Some(hold) = self.hold {
            tokio::time::sleep(hold).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        self.busy.store(false, Ordering::SeqCst);

        match next {
            Some(Err(e)) => Err(e),
            _ => Ok(vec![Order::filled_market(
                &request.symbol,
                request.side,
                Decimal::ONE,
                Decimal::ONE,
            )]),
        }
    }
}

/// Balance authority that serves fixed balances and counts fetches
pub struct CountingAuthority {
    balances: HashMap<String, AssetBalance>,
    pub fetches: AtomicUsize,
}

impl CountingAuthority {
    pub fn new(balances: HashMap<String, AssetBalance>) -> Self {
        Self {
            balances,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceAuthority for CountingAuthority {
    async fn fetch_balances(&self) -> Result<HashMap<String, AssetBalance>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.balances.clone())
    }
}

pub fn coordinator(
    ledger: Arc<Ledger>,
    markets: Arc<StaticMarkets>,
    context: AccountContext,
    dispatcher: Arc<ScriptedDispatcher>,
) -> OrderCreationCoordinator {
    let evaluator = EligibilityEvaluator::new(markets, context, LOOKUP_TIMEOUT);
    OrderCreationCoordinator::new("test-exchange", ledger, evaluator, dispatcher)
}

/// The ledger lock and the guard for `symbol` can be taken right away
pub fn assert_released(coordinator: &OrderCreationCoordinator, symbol: &str) {
    assert!(
        coordinator.guards().try_acquire(symbol).is_some(),
        "publication guard for {symbol} still held"
    );
    assert!(
        coordinator.ledger().try_lock().is_some(),
        "ledger lock still held"
    );
}
