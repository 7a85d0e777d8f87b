//! PostgreSQL store tests
//!
//! Run against a scratch database:
//! DCA_TEST_DATABASE_URL=postgres://localhost/crypto_dca_test cargo test --test postgres_store

use rust_decimal_macros::dec;
use uuid::Uuid;

use crypto_dca::adapters::PostgresStore;
use crypto_dca::domain::{Order, OrderSide, OrderStatus};
use crypto_dca::persistence::OrderRepository;

async fn test_store(test: &str) -> Option<PostgresStore> {
    let Ok(url) = std::env::var("DCA_TEST_DATABASE_URL") else {
        eprintln!("Skipping {}: DCA_TEST_DATABASE_URL not set", test);
        return None;
    };
    let store = PostgresStore::new(&url, 2).await.unwrap();
    store.migrate().await.unwrap();
    Some(store)
}

fn unique_user() -> String {
    format!("test-{}", Uuid::new_v4())
}

#[tokio::test]
async fn ensure_user_is_idempotent() {
    let Some(store) = test_store("ensure_user_is_idempotent").await else {
        return;
    };
    let name = unique_user();

    let first = store.ensure_user(&name).await.unwrap();
    let second = store.ensure_user(&name).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.name, name);
}

#[tokio::test]
async fn filled_order_updates_last_order() {
    let Some(store) = test_store("filled_order_updates_last_order").await else {
        return;
    };
    let user = store.ensure_user(&unique_user()).await.unwrap();

    let order = Order::new(
        user.id,
        "BTCEUR",
        OrderSide::Buy,
        dec!(49950.00),
        dec!(0.00200),
        dec!(0.999),
        2,
        OrderStatus::Filled,
    )
    .with_exchange_order_id(42);
    let id = store.insert_order(&order).await.unwrap();
    assert_eq!(id, order.id);

    let last = store
        .get_last_order(user.id, "BTCEUR", OrderSide::Buy)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(last.order_id, order.id);
    assert_eq!(last.price, dec!(49950.00));
    assert_eq!(last.quantity, dec!(0.00200));
    assert_eq!(last.multiplier, dec!(0.999));
    assert_eq!(last.reprices, 2);
    assert_eq!(last.status, OrderStatus::Filled);
}

#[tokio::test]
async fn second_fill_overwrites_last_order() {
    let Some(store) = test_store("second_fill_overwrites_last_order").await else {
        return;
    };
    let user = store.ensure_user(&unique_user()).await.unwrap();

    let first = Order::new(
        user.id,
        "BTCEUR",
        OrderSide::Buy,
        dec!(49950.00),
        dec!(0.00200),
        dec!(0.999),
        0,
        OrderStatus::Filled,
    );
    store.insert_order(&first).await.unwrap();
    let before = store
        .get_last_order(user.id, "BTCEUR", OrderSide::Buy)
        .await
        .unwrap()
        .unwrap();

    let second = Order::new(
        user.id,
        "BTCEUR",
        OrderSide::Buy,
        dec!(51000.00),
        dec!(0.00196),
        dec!(0.998),
        1,
        OrderStatus::Filled,
    );
    store.insert_order(&second).await.unwrap();

    let after = store
        .get_last_order(user.id, "BTCEUR", OrderSide::Buy)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.order_id, second.id);
    assert_eq!(after.price, dec!(51000.00));
    assert_eq!(after.reprices, 1);
    assert!(after.updated_at >= before.updated_at);

    assert_eq!(
        store
            .count_last_orders(user.id, "BTCEUR", OrderSide::Buy)
            .await
            .unwrap(),
        1
    );
    assert_eq!(store.count_orders(user.id).await.unwrap(), 2);
}

#[tokio::test]
async fn non_filled_orders_leave_last_order_untouched() {
    let Some(store) = test_store("non_filled_orders_leave_last_order_untouched").await else {
        return;
    };
    let user = store.ensure_user(&unique_user()).await.unwrap();

    let filled = Order::new(
        user.id,
        "ETHEUR",
        OrderSide::Buy,
        dec!(3000.00),
        dec!(0.0333),
        dec!(0.999),
        0,
        OrderStatus::Filled,
    );
    store.insert_order(&filled).await.unwrap();

    for status in [OrderStatus::Pending, OrderStatus::Cancelled] {
        let order = Order::new(
            user.id,
            "ETHEUR",
            OrderSide::Buy,
            dec!(3100.00),
            dec!(0.0322),
            dec!(0.999),
            1,
            status,
        );
        store.insert_order(&order).await.unwrap();
    }

    let last = store
        .get_last_order(user.id, "ETHEUR", OrderSide::Buy)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(last.order_id, filled.id);
    assert_eq!(last.price, dec!(3000.00));
    assert_eq!(store.count_orders(user.id).await.unwrap(), 3);
}

#[tokio::test]
async fn no_last_order_without_fill() {
    let Some(store) = test_store("no_last_order_without_fill").await else {
        return;
    };
    let user = store.ensure_user(&unique_user()).await.unwrap();

    let pending = Order::new(
        user.id,
        "BTCEUR",
        OrderSide::Buy,
        dec!(49950.00),
        dec!(0.002),
        dec!(0.999),
        0,
        OrderStatus::Pending,
    );
    store.insert_order(&pending).await.unwrap();

    assert!(store
        .get_last_order(user.id, "BTCEUR", OrderSide::Buy)
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        store
            .count_last_orders(user.id, "BTCEUR", OrderSide::Buy)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn check_constraints_reject_bad_rows() {
    let Some(store) = test_store("check_constraints_reject_bad_rows").await else {
        return;
    };
    let user = store.ensure_user(&unique_user()).await.unwrap();

    let bad = Order::new(
        user.id,
        "BTCEUR",
        OrderSide::Buy,
        dec!(0),
        dec!(0.002),
        dec!(0.999),
        0,
        OrderStatus::Filled,
    );
    assert!(store.insert_order(&bad).await.is_err());
    assert!(store
        .get_last_order(user.id, "BTCEUR", OrderSide::Buy)
        .await
        .unwrap()
        .is_none());
}
