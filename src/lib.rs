pub mod config;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod gate;
pub mod ledger;

pub use config::AppConfig;
pub use domain::{DirectionalState, DispatchRequest, MarketLimits, Order, OrderSide, Signal, Symbol};
pub use error::{DispatchError, GateError, Result};
pub use exchange::{
    build_simulated_gate, BalanceAuthority, MarketStatusProvider, OrderDispatcher, PositionSizer,
    PriceProvider, SimulatedExchange, SimulatedGate, TradingMode,
};
pub use gate::{
    clamp, AccountContext, DispatchOutcome, EligibilityEvaluator, FailureKind,
    OrderCreationCoordinator, SignalConsumer, SymbolGuards,
};
pub use ledger::{AssetBalance, Ledger, LedgerGuard, LedgerSnapshot};
