use crate::domain::{LastOrder, Order, OrderSide, OrderStatus, User};
use crate::error::{DcaError, Result};
use crate::persistence::OrderRepository;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    fn reprices_to_db(reprices: u32) -> Result<i32> {
        i32::try_from(reprices)
            .map_err(|_| DcaError::Validation(format!("reprices out of range: {}", reprices)))
    }

    fn side_from_db(raw: &str) -> Result<OrderSide> {
        OrderSide::try_from(raw).map_err(DcaError::Internal)
    }

    fn status_from_db(raw: &str) -> Result<OrderStatus> {
        OrderStatus::try_from(raw).map_err(DcaError::Internal)
    }

    fn last_order_from_row(r: &PgRow) -> Result<LastOrder> {
        let side: String = r.try_get("side")?;
        let status: String = r.try_get("status")?;
        let reprices: i32 = r.try_get("reprices")?;

        Ok(LastOrder {
            order_id: r.try_get("order_id")?,
            user_id: r.try_get("user_id")?,
            symbol: r.try_get("symbol")?,
            side: Self::side_from_db(&side)?,
            price: r.try_get("price")?,
            quantity: r.try_get("quantity")?,
            multiplier: r.try_get("multiplier")?,
            reprices: u32::try_from(reprices)
                .map_err(|_| DcaError::Internal(format!("negative reprices: {}", reprices)))?,
            status: Self::status_from_db(&status)?,
            created_at: r.try_get("created_at")?,
            updated_at: r.try_get("updated_at")?,
        })
    }

    /// Count orders for a user (all statuses)
    pub async fn count_orders(&self, user_id: Uuid) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM crypto_dca.orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    /// Count projection rows for a key; at most one by construction
    pub async fn count_last_orders(
        &self,
        user_id: Uuid,
        symbol: &str,
        side: OrderSide,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n FROM crypto_dca.last_orders
            WHERE user_id = $1 AND symbol = $2 AND side = $3
            "#,
        )
        .bind(user_id)
        .bind(symbol)
        .bind(side.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("n")?)
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    // ==================== Users ====================

    #[instrument(skip(self))]
    async fn ensure_user(&self, name: &str) -> Result<User> {
        let row = sqlx::query(
            r#"
            INSERT INTO crypto_dca.users (id, name)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(User {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
        })
    }

    // ==================== Orders ====================

    /// Insert an order; a FILLED order also refreshes `last_orders` in the same transaction
    #[instrument(skip(self, order), fields(order_id = %order.id, status = %order.status))]
    async fn insert_order(&self, order: &Order) -> Result<Uuid> {
        let reprices = Self::reprices_to_db(order.reprices)?;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO crypto_dca.orders
                (id, user_id, symbol, side, price, quantity, multiplier, reprices, status,
                 exchange_order_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(&order.symbol)
        .bind(order.side.as_str())
        .bind(order.price)
        .bind(order.quantity)
        .bind(order.multiplier)
        .bind(reprices)
        .bind(order.status.as_str())
        .bind(order.exchange_order_id)
        .bind(order.created_at)
        .fetch_one(&mut *tx)
        .await?;

        let order_id: Uuid = row.try_get("id")?;

        if order.status == OrderStatus::Filled {
            sqlx::query(
                r#"
                INSERT INTO crypto_dca.last_orders
                    (user_id, symbol, side, order_id, price, quantity, multiplier, reprices,
                     status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
                ON CONFLICT (user_id, symbol, side) DO UPDATE SET
                    order_id = EXCLUDED.order_id,
                    price = EXCLUDED.price,
                    quantity = EXCLUDED.quantity,
                    multiplier = EXCLUDED.multiplier,
                    reprices = EXCLUDED.reprices,
                    status = EXCLUDED.status,
                    created_at = EXCLUDED.created_at,
                    updated_at = NOW()
                "#,
            )
            .bind(order.user_id)
            .bind(&order.symbol)
            .bind(order.side.as_str())
            .bind(order_id)
            .bind(order.price)
            .bind(order.quantity)
            .bind(order.multiplier)
            .bind(reprices)
            .bind(order.status.as_str())
            .bind(order.created_at)
            .execute(&mut *tx)
            .await?;

            debug!("Refreshed last order for {} {}", order.symbol, order.side);
        }

        tx.commit().await?;
        Ok(order_id)
    }

    #[instrument(skip(self))]
    async fn get_last_order(
        &self,
        user_id: Uuid,
        symbol: &str,
        side: OrderSide,
    ) -> Result<Option<LastOrder>> {
        let row = sqlx::query(
            r#"
            SELECT order_id, user_id, symbol, side, price, quantity, multiplier, reprices,
                   status, created_at, updated_at
            FROM crypto_dca.last_orders
            WHERE user_id = $1 AND symbol = $2 AND side = $3
            "#,
        )
        .bind(user_id)
        .bind(symbol)
        .bind(side.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::last_order_from_row).transpose()
    }
}
