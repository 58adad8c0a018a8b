use serde::{Deserialize, Serialize};

use crate::domain::Order;

/// Terminal failure class reported for a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Venue minimum order volume not reached
    MinimalVolumeNotMet,
    /// Venue refused the order
    OrderRejected,
    /// Funds were still missing after one ledger refresh
    InsufficientFundsAfterRetry,
    /// Market limits or sizing inputs could not be resolved
    UnknownSymbol,
    /// Anything else
    Unexpected,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::MinimalVolumeNotMet => "minimal_volume_not_met",
            FailureKind::OrderRejected => "order_rejected",
            FailureKind::InsufficientFundsAfterRetry => "insufficient_funds_after_retry",
            FailureKind::UnknownSymbol => "unknown_symbol",
            FailureKind::Unexpected => "unexpected",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classified result of one signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Created(Vec<Order>),
    /// Not eligible, nothing dispatched
    Empty,
    Failed(FailureKind),
}

impl DispatchOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, DispatchOutcome::Created(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, DispatchOutcome::Empty)
    }

    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            DispatchOutcome::Failed(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn orders(&self) -> &[Order] {
        match self {
            DispatchOutcome::Created(orders) => orders,
            _ => &[],
        }
    }
}

impl std::fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchOutcome::Created(orders) => write!(f, "created {} order(s)", orders.len()),
            DispatchOutcome::Empty => write!(f, "empty"),
            DispatchOutcome::Failed(kind) => write!(f, "failed: {}", kind),
        }
    }
}
