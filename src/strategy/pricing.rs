//! Price engine: discounted limit price, order quantity and filter checks.
//!
//! All rounding is downward: price to the tick size, quantity to the step size.

use rust_decimal::Decimal;
use tracing::info;

use crate::domain::SymbolFilters;
use crate::error::{DcaError, OrderError, Result};

/// Floor `value` to a multiple of `step`, expressed at the step's scale.
pub fn round_down_to_step(value: Decimal, step: Decimal) -> Result<Decimal> {
    if step <= Decimal::ZERO {
        return Err(DcaError::Validation(format!(
            "step must be positive, got {}",
            step
        )));
    }

    let units = (value / step).floor();
    let mut rounded = units * step;
    rounded.rescale(step.normalize().scale());
    Ok(rounded)
}

/// `best_ask * multiplier` rounded down to the tick size.
pub fn compute_target_price(
    best_ask: Decimal,
    multiplier: Decimal,
    tick_size: Decimal,
) -> Result<Decimal> {
    if best_ask <= Decimal::ZERO {
        return Err(DcaError::InvalidMarketData(format!(
            "best ask must be positive, got {}",
            best_ask
        )));
    }
    validate_multiplier(multiplier)?;

    let price = round_down_to_step(best_ask * multiplier, tick_size)?;
    if price <= Decimal::ZERO {
        return Err(DcaError::Validation(format!(
            "limit price rounds to zero: {} * {} with tick {}",
            best_ask, multiplier, tick_size
        )));
    }
    Ok(price)
}

/// Quantity of base asset that `spend` buys at `price`, rounded down to the step.
pub fn compute_quantity(spend: Decimal, price: Decimal, step_size: Decimal) -> Result<Decimal> {
    if price <= Decimal::ZERO {
        return Err(DcaError::Validation(format!(
            "price must be positive, got {}",
            price
        )));
    }
    round_down_to_step(spend / price, step_size)
}

/// Multiplier must lie in (0, 1]
pub fn validate_multiplier(multiplier: Decimal) -> Result<()> {
    if multiplier <= Decimal::ZERO || multiplier > Decimal::ONE {
        return Err(DcaError::Validation(format!(
            "price multiplier must be in (0, 1], got {}",
            multiplier
        )));
    }
    Ok(())
}

/// Check an order against the symbol's quantity and notional rules.
pub fn check_filters(
    quantity: Decimal,
    price: Decimal,
    filters: &SymbolFilters,
) -> std::result::Result<(), OrderError> {
    if quantity <= Decimal::ZERO || quantity < filters.min_qty {
        return Err(OrderError::FilterViolation(format!(
            "Quantity {} below min {}",
            quantity, filters.min_qty
        )));
    }

    if quantity > filters.max_qty {
        return Err(OrderError::FilterViolation(format!(
            "Quantity {} exceeds max {}",
            quantity, filters.max_qty
        )));
    }

    let notional = quantity * price;
    if notional < filters.min_notional {
        return Err(OrderError::FilterViolation(format!(
            "Notional {} below min {}. Increase the spend amount.",
            notional, filters.min_notional
        )));
    }

    Ok(())
}

/// Applies a fixed multiplier and tick size to successive best-ask readings
#[derive(Debug, Clone)]
pub struct PriceEngine {
    multiplier: Decimal,
    tick_size: Decimal,
}

impl PriceEngine {
    pub fn new(multiplier: Decimal, tick_size: Decimal) -> Result<Self> {
        validate_multiplier(multiplier)?;
        if tick_size <= Decimal::ZERO {
            return Err(DcaError::InvalidMarketData(format!(
                "tick size must be positive, got {}",
                tick_size
            )));
        }
        Ok(Self {
            multiplier,
            tick_size,
        })
    }

    pub fn multiplier(&self) -> Decimal {
        self.multiplier
    }

    pub fn target_price(&self, best_ask: Decimal) -> Result<Decimal> {
        let limit_price = compute_target_price(best_ask, self.multiplier, self.tick_size)?;
        info!(
            "Limit price: {} * {} = {} -> {}",
            best_ask,
            self.multiplier,
            best_ask * self.multiplier,
            limit_price
        );
        Ok(limit_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_target_price_example() {
        let price = compute_target_price(dec!(50000.00), dec!(0.999), dec!(0.01)).unwrap();
        assert_eq!(price, dec!(49950.00));
        assert_eq!(price.scale(), 2);
    }

    #[test]
    fn test_target_price_rounds_down_to_tick() {
        // 123.456 * 0.999 = 123.332544
        let price = compute_target_price(dec!(123.456), dec!(0.999), dec!(0.01)).unwrap();
        assert_eq!(price, dec!(123.33));

        // Tick given with trailing zeros, as the exchange reports it
        let price = compute_target_price(dec!(123.456), dec!(0.999), dec!(0.10000000)).unwrap();
        assert_eq!(price, dec!(123.3));
        assert_eq!(price.scale(), 1);
    }

    #[test]
    fn test_target_price_never_exceeds_ask() {
        let asks = [dec!(0.00012345), dec!(1), dec!(27.5), dec!(64123.99), dec!(99999.999)];
        let multipliers = [dec!(0.5), dec!(0.95), dec!(0.999), dec!(1)];
        let ticks = [dec!(0.00000001), dec!(0.01), dec!(0.1)];

        for ask in asks {
            for m in multipliers {
                for tick in ticks {
                    let Ok(price) = compute_target_price(ask, m, tick) else {
                        // Only legitimate failure: price smaller than one tick
                        assert!(ask * m < tick);
                        continue;
                    };
                    assert!(price <= ask, "{} > {} (m={}, tick={})", price, ask, m, tick);
                    assert!(price <= ask * m);
                    assert!(ask * m - price < tick);
                    assert_eq!((price / tick).fract(), Decimal::ZERO);
                }
            }
        }
    }

    #[test]
    fn test_multiplier_one_keeps_ask_on_tick() {
        let price = compute_target_price(dec!(50000.00), Decimal::ONE, dec!(0.01)).unwrap();
        assert_eq!(price, dec!(50000.00));
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        assert!(compute_target_price(Decimal::ZERO, dec!(0.999), dec!(0.01)).is_err());
        assert!(compute_target_price(dec!(-1), dec!(0.999), dec!(0.01)).is_err());
        assert!(compute_target_price(dec!(100), Decimal::ZERO, dec!(0.01)).is_err());
        assert!(compute_target_price(dec!(100), dec!(1.01), dec!(0.01)).is_err());
        assert!(compute_target_price(dec!(100), dec!(0.9), Decimal::ZERO).is_err());
        // 0.004 rounds to zero at tick 0.01
        assert!(compute_target_price(dec!(0.005), dec!(0.8), dec!(0.01)).is_err());
    }

    #[test]
    fn test_compute_quantity() {
        // 100 / 49950 = 0.002002002...
        let qty = compute_quantity(dec!(100), dec!(49950.00), dec!(0.00001000)).unwrap();
        assert_eq!(qty, dec!(0.00200));
    }

    #[test]
    fn test_check_filters() {
        let filters = SymbolFilters {
            tick_size: dec!(0.01),
            step_size: dec!(0.00001),
            min_notional: dec!(5),
            min_qty: dec!(0.00001),
            max_qty: dec!(9000),
        };

        assert!(check_filters(dec!(0.002), dec!(49950), &filters).is_ok());

        let err = check_filters(dec!(0.000001), dec!(49950), &filters).unwrap_err();
        assert!(err.to_string().contains("below min"));

        let err = check_filters(dec!(9001), dec!(1), &filters).unwrap_err();
        assert!(err.to_string().contains("exceeds max"));

        let err = check_filters(dec!(0.0001), dec!(49950), &filters).unwrap_err();
        assert!(err.to_string().contains("Notional"));
    }

    #[test]
    fn test_price_engine() {
        let engine = PriceEngine::new(dec!(0.999), dec!(0.01)).unwrap();
        assert_eq!(engine.target_price(dec!(50000)).unwrap(), dec!(49950.00));
        assert!(PriceEngine::new(dec!(0), dec!(0.01)).is_err());
        assert!(PriceEngine::new(dec!(0.9), dec!(0)).is_err());
    }
}
