use thiserror::Error;

/// Main error type for the execution gate
#[derive(Error, Debug)]
pub enum GateError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Market lookup errors
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Lookup timed out after {timeout_ms}ms: {what}")]
    LookupTimeout { what: String, timeout_ms: u64 },

    // Ledger errors
    #[error("Ledger refresh failed: {0}")]
    LedgerRefresh(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl GateError {
    /// Whether this error means market limits or sizing inputs could not be resolved
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            GateError::UnknownSymbol(_) | GateError::LookupTimeout { .. }
        )
    }
}

/// Result type alias for GateError
pub type Result<T> = std::result::Result<T, GateError>;

/// Failure classes an order dispatcher can raise.
///
/// Only `InsufficientFunds` is ever retried, and only once.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Minimal exchange trade volume not reached: {0}")]
    MinimalVolumeNotMet(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Unexpected dispatch failure: {0}")]
    Unexpected(String),
}

impl From<GateError> for DispatchError {
    fn from(err: GateError) -> Self {
        DispatchError::Unexpected(err.to_string())
    }
}
