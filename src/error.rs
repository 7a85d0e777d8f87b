use thiserror::Error;

/// Main error type for the DCA bot
#[derive(Error, Debug)]
pub enum DcaError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success response from the exchange that is not a price rejection
    #[error("Exchange API error {status}: [{code:?}] {message}")]
    Exchange {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    // Market data errors
    #[error("Invalid market data: {0}")]
    InvalidMarketData(String),

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    // State machine errors
    #[error("Invalid state transition: from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Crypto/signing errors
    #[error("Signature error: {0}")]
    Signature(String),

    // Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for DcaError
pub type Result<T> = std::result::Result<T, DcaError>;

/// Reasons a run ends without a placed (or kept) order
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("Max reprices reached: {reprices}")]
    MaxRepricesReached { reprices: u32 },

    #[error("Order rejected by filters: {0}")]
    FilterViolation(String),

    #[error("Unexpected exchange status: {0}")]
    UnexpectedStatus(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_error_includes_code_and_message() {
        let err = DcaError::Exchange {
            status: 400,
            code: Some(-1121),
            message: "Invalid symbol.".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("400"));
        assert!(msg.contains("-1121"));
        assert!(msg.contains("Invalid symbol."));
    }

    #[test]
    fn order_error_display() {
        let err = OrderError::MaxRepricesReached { reprices: 3 };
        assert_eq!(err.to_string(), "Max reprices reached: 3");
    }
}
