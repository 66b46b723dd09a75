use thiserror::Error;

/// Domain errors for the rate and ledger subsystems.
///
/// These are never swallowed inside the core: each operation either succeeds
/// or returns exactly one of these to its caller. The single exception is the
/// rates updater, which converts per-source failures into report entries so
/// one broken provider cannot sink the whole refresh.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("currency not found: {0}")]
    CurrencyNotFound(String),

    #[error("insufficient funds: available {available} {code}, required {required} {code}")]
    InsufficientFunds {
        available: f64,
        required: f64,
        code: String,
    },

    #[error("external API request failed: {reason}")]
    ApiRequest { reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Storage(e.to_string())
    }
}
