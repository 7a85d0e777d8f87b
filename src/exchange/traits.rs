use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{OrderSide, SymbolFilters, TimeInForce};
use crate::error::Result;

/// Order status as reported by the exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeOrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    PendingCancel,
    Rejected,
    Expired,
    Other(String),
}

impl ExchangeOrderStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NEW" => Self::New,
            "PARTIALLY_FILLED" => Self::PartiallyFilled,
            "FILLED" => Self::Filled,
            "CANCELED" | "CANCELLED" => Self::Canceled,
            "PENDING_CANCEL" => Self::PendingCancel,
            "REJECTED" => Self::Rejected,
            "EXPIRED" | "EXPIRED_IN_MATCH" => Self::Expired,
            other => Self::Other(other.to_string()),
        }
    }

    /// Order is still on the book
    pub fn is_open(&self) -> bool {
        matches!(self, Self::New | Self::PartiallyFilled)
    }
}

impl std::fmt::Display for ExchangeOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::New => "NEW",
            Self::PartiallyFilled => "PARTIALLY_FILLED",
            Self::Filled => "FILLED",
            Self::Canceled => "CANCELED",
            Self::PendingCancel => "PENDING_CANCEL",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
            Self::Other(s) => s.as_str(),
        };
        write!(f, "{}", s)
    }
}

/// Limit order to place
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
    pub time_in_force: TimeInForce,
}

impl LimitOrderRequest {
    pub fn buy(symbol: &str, price: Decimal, quantity: Decimal, time_in_force: TimeInForce) -> Self {
        Self {
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            price,
            quantity,
            time_in_force,
        }
    }

    /// Same order at a different price
    pub fn repriced(&self, price: Decimal) -> Self {
        Self {
            price,
            ..self.clone()
        }
    }
}

/// Exchange acknowledgement of an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: i64,
    pub status: ExchangeOrderStatus,
}

/// Result of a submission that reached the exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted(OrderAck),
    /// The exchange refused the price; recoverable by repricing
    Rejected { code: Option<i64>, reason: String },
}

/// Order submitter capability consumed by the executor.
///
/// Every `Err` is fatal for the run: transport failures, timeouts, auth
/// problems and unknown symbols are never retried as reprices.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    fn is_dry_run(&self) -> bool;

    async fn get_symbol_filters(&self, symbol: &str) -> Result<SymbolFilters>;

    async fn get_best_ask(&self, symbol: &str) -> Result<Decimal>;

    async fn submit_limit_order(&self, request: &LimitOrderRequest) -> Result<SubmitOutcome>;

    async fn get_order(&self, symbol: &str, order_id: i64) -> Result<OrderAck>;

    async fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parse_exchange_status_accepts_known_values() {
        assert_eq!(ExchangeOrderStatus::parse("NEW"), ExchangeOrderStatus::New);
        assert_eq!(
            ExchangeOrderStatus::parse("partially_filled"),
            ExchangeOrderStatus::PartiallyFilled
        );
        assert_eq!(
            ExchangeOrderStatus::parse("EXPIRED_IN_MATCH"),
            ExchangeOrderStatus::Expired
        );
        assert_eq!(
            ExchangeOrderStatus::parse("WEIRD"),
            ExchangeOrderStatus::Other("WEIRD".to_string())
        );
    }

    #[test]
    fn open_statuses() {
        assert!(ExchangeOrderStatus::New.is_open());
        assert!(ExchangeOrderStatus::PartiallyFilled.is_open());
        assert!(!ExchangeOrderStatus::Filled.is_open());
        assert!(!ExchangeOrderStatus::Canceled.is_open());
    }

    #[test]
    fn repriced_request_keeps_quantity() {
        let req = LimitOrderRequest::buy("BTCEUR", dec!(49950), dec!(0.002), TimeInForce::GTC);
        let next = req.repriced(dec!(50100));
        assert_eq!(next.price, dec!(50100));
        assert_eq!(next.quantity, dec!(0.002));
        assert_eq!(next.side, OrderSide::Buy);
    }
}
