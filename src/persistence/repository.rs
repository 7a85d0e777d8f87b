use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{LastOrder, Order, OrderSide, User};
use crate::error::Result;

/// Storage for users, orders and the last-filled projection.
///
/// `insert_order` owns the `last_orders` invariant: inserting a FILLED order
/// upserts the (user_id, symbol, side) row in the same transaction. Callers
/// never write `last_orders` themselves.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Return the user with this name, creating it if needed
    async fn ensure_user(&self, name: &str) -> Result<User>;

    /// Append an order row and return its id
    async fn insert_order(&self, order: &Order) -> Result<Uuid>;

    /// Most recent FILLED order for the key, if any
    async fn get_last_order(
        &self,
        user_id: Uuid,
        symbol: &str,
        side: OrderSide,
    ) -> Result<Option<LastOrder>>;
}
