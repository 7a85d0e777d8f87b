use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for OrderSide {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(OrderSide::Buy),
            "SELL" => Ok(OrderSide::Sell),
            _ => Err(format!("Unknown order side: {}", s)),
        }
    }
}

/// Time in force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good Till Cancelled
    GTC,
    /// Immediate Or Cancel
    IOC,
    /// Fill Or Kill
    FOK,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::GTC => "GTC",
            TimeInForce::IOC => "IOC",
            TimeInForce::FOK => "FOK",
        }
    }
}

impl Default for TimeInForce {
    fn default() -> Self {
        Self::GTC
    }
}

impl std::fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TimeInForce {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GTC" => Ok(TimeInForce::GTC),
            "IOC" => Ok(TimeInForce::IOC),
            "FOK" => Ok(TimeInForce::FOK),
            _ => Err(format!("invalid time in force '{}'; expected GTC|IOC|FOK", s)),
        }
    }
}

/// Status of a persisted order row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Accepted by the exchange and still resting
    Pending,
    /// Fully filled
    Filled,
    /// Accepted, then cancelled before filling
    Cancelled,
    /// Order failed (internal error)
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for OrderStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "FILLED" => Ok(OrderStatus::Filled),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "FAILED" => Ok(OrderStatus::Failed),
            _ => Err(format!("Unknown order status: {}", s)),
        }
    }
}

/// Order row (append-only fact of one run)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
    /// Fraction of the best ask used for the limit price, in (0, 1]
    pub multiplier: Decimal,
    pub reprices: u32,
    pub status: OrderStatus,
    pub exchange_order_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: Uuid,
        symbol: &str,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
        multiplier: Decimal,
        reprices: u32,
        status: OrderStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            symbol: symbol.to_string(),
            side,
            price,
            quantity,
            multiplier,
            reprices,
            status,
            exchange_order_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_exchange_order_id(mut self, exchange_order_id: i64) -> Self {
        self.exchange_order_id = Some(exchange_order_id);
        self
    }

    /// Quote-asset value of the order
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }
}

/// Most recent FILLED order for a (user, symbol, side) key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastOrder {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
    pub multiplier: Decimal,
    pub reprices: u32,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LastOrder {
    /// True when the order was created in the same ISO week (year, week) as `now`
    pub fn is_same_iso_week(&self, now: DateTime<Utc>) -> bool {
        let created = self.created_at.iso_week();
        let current = now.iso_week();
        created.year() == current.year() && created.week() == current.week()
    }
}
