use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trading rules the exchange enforces for one symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolFilters {
    /// Price increment
    pub tick_size: Decimal,
    /// Quantity increment
    pub step_size: Decimal,
    /// Minimum order value in the quote asset
    pub min_notional: Decimal,
    pub min_qty: Decimal,
    pub max_qty: Decimal,
}

impl Default for SymbolFilters {
    fn default() -> Self {
        Self {
            tick_size: Decimal::new(1, 2),
            step_size: Decimal::new(1, 5),
            min_notional: Decimal::new(10, 0),
            min_qty: Decimal::ZERO,
            max_qty: Decimal::new(9_999_999, 0),
        }
    }
}

impl std::fmt::Display for SymbolFilters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tick={}, step={}, min_notional={}, qty=[{}, {}]",
            self.tick_size, self.step_size, self.min_notional, self.min_qty, self.max_qty
        )
    }
}
