use uuid::Uuid;

/// The error taxonomy for every core operation (spec §7).
///
/// Every engine operation is atomic: any variant returned here means the
/// enclosing transaction was rolled back and no partial state is visible.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: caller {caller} may not act on {resource}")]
    Forbidden { caller: Uuid, resource: String },

    #[error("insufficient funds: available {available}, required {required} of {ticker}")]
    InsufficientFunds {
        ticker: String,
        available: i64,
        required: i64,
    },

    #[error("insufficient liquidity: book offers {available}, order needs {required}")]
    InsufficientLiquidity { available: i64, required: i64 },

    #[error("duplicate order: {0}")]
    DuplicateOrder(Uuid),

    #[error("ledger invariant violation: {0}")]
    LedgerInvariantViolation(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl ExchangeError {
    /// True when the caller may usefully retry the same request unmodified.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExchangeError::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, ExchangeError>;
