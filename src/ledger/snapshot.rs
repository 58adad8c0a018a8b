use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Balance of one asset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalance {
    /// Free to commit to new orders
    pub available: Decimal,
    /// Everything held, including amounts locked in open orders
    pub total: Decimal,
}

impl AssetBalance {
    pub fn new(available: Decimal, total: Decimal) -> Self {
        Self { available, total }
    }

    /// Fully available balance
    pub fn free(amount: Decimal) -> Self {
        Self::new(amount, amount)
    }
}

/// Open position on a leveraged symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionView {
    pub symbol: String,
    /// Signed quantity, positive for long
    pub quantity: Decimal,
    pub entry_price: Decimal,
}

/// Point-in-time read of the ledger, taken under its lock
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerSnapshot {
    pub(super) balances: HashMap<String, AssetBalance>,
    pub(super) positions: HashMap<String, PositionView>,
}

impl LedgerSnapshot {
    pub fn available_balance(&self, asset: &str) -> Decimal {
        self.balances
            .get(asset)
            .map(|b| b.available)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn total_holdings(&self, asset: &str) -> Decimal {
        self.balances
            .get(asset)
            .map(|b| b.total)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn open_position(&self, symbol: &str) -> Option<&PositionView> {
        self.positions.get(symbol)
    }

    /// Signed position quantity, zero when flat
    pub fn position_quantity(&self, symbol: &str) -> Decimal {
        self.open_position(symbol)
            .map(|p| p.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    /// Number of assets with a non-zero total
    pub fn traded_asset_count(&self) -> usize {
        self.balances
            .values()
            .filter(|b| !b.total.is_zero())
            .count()
    }

    /// Total portfolio value given per-asset prices in a common reference asset.
    /// Assets without a price are ignored.
    pub fn portfolio_value(&self, valuations: &HashMap<String, Decimal>) -> Decimal {
        self.balances
            .iter()
            .filter_map(|(asset, b)| valuations.get(asset).map(|price| b.total * price))
            .sum()
    }

    /// Share of total portfolio value held in `asset`, in [0, 1]
    pub fn holdings_ratio(&self, asset: &str, valuations: &HashMap<String, Decimal>) -> Decimal {
        let total = self.portfolio_value(valuations);
        if total.is_zero() {
            return Decimal::ZERO;
        }
        let held = valuations
            .get(asset)
            .map(|price| self.total_holdings(asset) * price)
            .unwrap_or(Decimal::ZERO);
        held / total
    }
}
