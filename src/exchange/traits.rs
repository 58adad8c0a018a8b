use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::domain::{DispatchRequest, MarketLimits, Order, OrderSide};
use crate::error::{DispatchError, GateError, Result};
use crate::ledger::{AssetBalance, LedgerGuard};

/// How the account commits capital on this exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingMode {
    Spot,
    Future,
}

impl Default for TradingMode {
    fn default() -> Self {
        Self::Spot
    }
}

impl TradingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::Future => "future",
        }
    }

    pub fn is_leveraged(&self) -> bool {
        matches!(self, Self::Future)
    }
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TradingMode {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "spot" => Ok(Self::Spot),
            "future" | "futures" | "margin" | "leveraged" => Ok(Self::Future),
            _ => Err("invalid trading mode; expected spot|future"),
        }
    }
}

pub fn parse_trading_mode(raw: &str) -> Result<TradingMode> {
    TradingMode::from_str(raw).map_err(|e| GateError::Validation(e.to_string()))
}

/// Market-status lookup (venue minimums)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketStatusProvider: Send + Sync {
    /// Fails with `GateError::UnknownSymbol` when the symbol cannot be resolved
    async fn get_limits(&self, symbol: &str) -> Result<MarketLimits>;
}

/// Current reference price lookup
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn reference_price(&self, symbol: &str) -> Result<Decimal>;
}

/// Inputs to the leveraged max-order-size computation
#[derive(Debug, Clone, PartialEq)]
pub struct SizingRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub reference_price: Decimal,
    /// Signed open position quantity, positive for long
    pub holding: Decimal,
    /// Total settlement-asset holdings available as margin
    pub margin_quantity: Decimal,
    pub leverage: Decimal,
}

/// Position-sizing collaborator for leveraged accounts. Pure and read-only.
#[cfg_attr(test, mockall::automock)]
pub trait PositionSizer: Send + Sync {
    fn max_order_size(&self, request: &SizingRequest) -> Result<Decimal>;
}

/// Strategy-specific order placement.
///
/// Runs with the ledger lock held; any ledger mutation goes through `ledger`.
#[async_trait]
pub trait OrderDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        request: &DispatchRequest,
        ledger: &mut LedgerGuard,
    ) -> std::result::Result<Vec<Order>, DispatchError>;
}

/// Authoritative source of account balances
#[async_trait]
pub trait BalanceAuthority: Send + Sync {
    async fn fetch_balances(&self) -> Result<HashMap<String, AssetBalance>>;
}
