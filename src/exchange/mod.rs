pub mod factory;
pub mod simulator;
pub mod sizing;
mod traits;

pub use factory::{build_simulated_exchange, build_simulated_gate, SimulatedGate};
pub use simulator::SimulatedExchange;
pub use sizing::LinearPositionSizer;
pub use traits::{
    parse_trading_mode, BalanceAuthority, MarketStatusProvider, OrderDispatcher, PositionSizer,
    PriceProvider, SizingRequest, TradingMode,
};

#[cfg(test)]
pub use traits::{MockMarketStatusProvider, MockPositionSizer, MockPriceProvider};
