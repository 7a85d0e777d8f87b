/// Input validation for user input and exchange data
///
/// Exchange payloads are checked before they reach the price engine so a
/// malformed response can never turn into an order.
use crate::error::{DcaError, Result};
use rust_decimal::Decimal;

/// Normalize a trading pair to exchange format (e.g., "btc/eur" -> "BTCEUR")
pub fn normalize_symbol(symbol: &str) -> String {
    symbol
        .trim()
        .chars()
        .filter(|c| !matches!(c, '-' | '/' | '_'))
        .collect::<String>()
        .to_uppercase()
}

/// Validate a normalized symbol
///
/// # Returns
/// * `Ok(())` if the symbol is non-empty ASCII alphanumeric
/// * `Err` otherwise
pub fn validate_symbol(symbol: &str) -> Result<()> {
    if symbol.is_empty() {
        return Err(DcaError::Validation("Symbol cannot be empty".to_string()));
    }

    if !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DcaError::Validation(format!(
            "Invalid symbol format: {}",
            symbol
        )));
    }

    Ok(())
}

/// Validate a price received from the exchange (must be strictly positive)
///
/// # Arguments
/// * `price` - Price to validate
/// * `field_name` - Name of the field for error messages
pub fn validate_price(price: Decimal, field_name: &str) -> Result<()> {
    if price <= Decimal::ZERO {
        return Err(DcaError::InvalidMarketData(format!(
            "{} must be positive: {}",
            field_name, price
        )));
    }

    Ok(())
}

/// Parse an exchange decimal string
pub fn parse_decimal(raw: &str, field_name: &str) -> Result<Decimal> {
    raw.trim().parse::<Decimal>().map_err(|e| {
        DcaError::InvalidMarketData(format!("{} is not a decimal ({}): {}", field_name, raw, e))
    })
}
