//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency and truncate
//! the tables before each test, so they are serialized with `serial_test`.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration
//! ```

use std::sync::Arc;
use std::time::Duration;

use common::{NewOrder, NewOrderItem, NewProduct, NewUser, Product, ProductId, User, UserId};
use rust_decimal::Decimal;
use serial_test::serial;
use sqlx::PgPool;
use store::{
    OrderStore, PostgresStore, ProductStore, StoreError, TxManager, UserStore, with_tx,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!("../../../migrations/001_create_tables.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let store = PostgresStore::connect(&info.connection_string, 10)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_items, orders, products, users")
        .execute(store.pool())
        .await
        .unwrap();

    store
}

async fn seed(store: &PostgresStore, quantity: i64, price: Decimal) -> (User, Product) {
    let user = store
        .create_user(NewUser {
            email: "buyer@example.com".to_string(),
            first_name: "Buyer".to_string(),
            age: 30,
            password_hash: "hash".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let product = store
        .create_product(NewProduct {
            description: "Widget".to_string(),
            tags: vec!["tools".to_string()],
            quantity,
            price,
            ..Default::default()
        })
        .await
        .unwrap();
    (user, product)
}

fn new_order(user_id: &UserId, product: &Product, quantity: i64) -> NewOrder {
    NewOrder {
        id: None,
        user_id: user_id.clone(),
        created_at: None,
        total_price: product.price * Decimal::from(quantity),
        items: vec![NewOrderItem {
            id: None,
            product_id: product.id.clone(),
            quantity,
            price: product.price,
        }],
    }
}

/// Lock, check and decrement a single product, then persist the order.
async fn buy_one(store: PostgresStore, user_id: UserId, product_id: ProductId) -> Result<(), StoreError> {
    let inner = store.clone();
    with_tx(&store, move |tx| {
        Box::pin(async move {
            let locked = inner
                .lock_products_for_update(tx, std::slice::from_ref(&product_id))
                .await?;
            let product = locked
                .into_iter()
                .next()
                .ok_or_else(|| StoreError::NotFound {
                    entity: "product",
                    id: product_id.to_string(),
                })?;
            if product.quantity < 1 {
                return Err(StoreError::Conflict("insufficient stock".to_string()));
            }
            inner.apply_stock_delta(tx, &product.id, -1).await?;
            inner
                .create_order(tx, new_order(&user_id, &product, 1))
                .await?;
            Ok(())
        })
    })
    .await
}

#[tokio::test]
#[serial]
async fn create_and_read_user() {
    let store = get_test_store().await;
    let (user, _) = seed(&store, 1, Decimal::new(100, 2)).await;

    let by_id = store.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(by_id.email, "buyer@example.com");

    let by_email = store
        .get_user_by_email("BUYER@EXAMPLE.COM")
        .await
        .unwrap();
    assert_eq!(by_email.map(|u| u.id), Some(user.id));
}

#[tokio::test]
#[serial]
async fn duplicate_email_is_conflict() {
    let store = get_test_store().await;
    seed(&store, 1, Decimal::new(100, 2)).await;

    let result = store
        .create_user(NewUser {
            email: "Buyer@Example.com".to_string(),
            age: 40,
            password_hash: "hash".to_string(),
            ..Default::default()
        })
        .await;

    assert!(matches!(result, Err(StoreError::Conflict(_))));
}

#[tokio::test]
#[serial]
async fn product_roundtrip_keeps_exact_price_and_tags() {
    let store = get_test_store().await;
    let (_, product) = seed(&store, 7, Decimal::new(1250, 2)).await;

    let loaded = store.get_product(&product.id).await.unwrap().unwrap();
    assert_eq!(loaded.price, Decimal::new(1250, 2));
    assert_eq!(loaded.tags, vec!["tools".to_string()]);
    assert_eq!(loaded.quantity, 7);
}

#[tokio::test]
#[serial]
async fn apply_delta_distinguishes_conflict_and_not_found() {
    let store = get_test_store().await;
    let (_, product) = seed(&store, 2, Decimal::new(100, 2)).await;

    let mut tx = store.begin().await.unwrap();
    let shortfall = store.apply_stock_delta(&mut tx, &product.id, -3).await;
    assert!(matches!(shortfall, Err(StoreError::Conflict(_))));

    let missing = store
        .apply_stock_delta(&mut tx, &ProductId::new("missing"), -1)
        .await;
    assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    store.rollback(tx).await.unwrap();

    let loaded = store.get_product(&product.id).await.unwrap().unwrap();
    assert_eq!(loaded.quantity, 2);
}

#[tokio::test]
#[serial]
async fn order_persists_with_items_in_sequence() {
    let store = get_test_store().await;
    let (user, first) = seed(&store, 10, Decimal::new(1250, 2)).await;
    let second = store
        .create_product(NewProduct {
            description: "Gadget".to_string(),
            quantity: 10,
            price: Decimal::new(300, 2),
            ..Default::default()
        })
        .await
        .unwrap();

    let mut order = new_order(&user.id, &first, 2);
    order.items.push(NewOrderItem {
        id: None,
        product_id: second.id.clone(),
        quantity: 1,
        price: second.price,
    });
    order.total_price = Decimal::new(2800, 2);

    let mut tx = store.begin().await.unwrap();
    let created = store.create_order(&mut tx, order).await.unwrap();
    store.commit(tx).await.unwrap();

    let loaded = store.get_order(&created.id).await.unwrap().unwrap();
    assert_eq!(loaded.total_price, Decimal::new(2800, 2));
    assert_eq!(loaded.items.len(), 2);
    assert_eq!(loaded.items[0].product_id, first.id);
    assert_eq!(loaded.items[1].product_id, second.id);
    assert!(loaded.items.iter().all(|i| i.order_id == created.id));

    let listed = store.list_orders_for_user(&user.id).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
#[serial]
async fn order_for_unknown_user_is_not_found() {
    let store = get_test_store().await;
    let (_, product) = seed(&store, 1, Decimal::new(100, 2)).await;

    let mut tx = store.begin().await.unwrap();
    let result = store
        .create_order(&mut tx, new_order(&UserId::new("ghost"), &product, 1))
        .await;
    assert!(matches!(
        result,
        Err(StoreError::NotFound { entity: "user", .. })
    ));
}

#[tokio::test]
#[serial]
async fn row_lock_blocks_second_transaction_until_commit() {
    let store = get_test_store().await;
    let (_, product) = seed(&store, 5, Decimal::new(100, 2)).await;

    let mut first = store.begin().await.unwrap();
    store
        .lock_products_for_update(&mut first, std::slice::from_ref(&product.id))
        .await
        .unwrap();
    store
        .apply_stock_delta(&mut first, &product.id, -2)
        .await
        .unwrap();

    let contender = store.clone();
    let product_id = product.id.clone();
    let waiting = tokio::spawn(async move {
        let mut second = contender.begin().await.unwrap();
        let locked = contender
            .lock_products_for_update(&mut second, std::slice::from_ref(&product_id))
            .await
            .unwrap();
        contender.commit(second).await.unwrap();
        locked[0].quantity
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!waiting.is_finished());

    store.commit(first).await.unwrap();
    let seen = tokio::time::timeout(Duration::from_secs(5), waiting)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen, 3);
}

#[tokio::test]
#[serial]
async fn concurrent_buyers_never_oversell() {
    let store = get_test_store().await;
    let (user, product) = seed(&store, 3, Decimal::new(1000, 2)).await;

    let handles: Vec<_> = (0..5)
        .map(|_| {
            tokio::spawn(buy_one(
                store.clone(),
                user.id.clone(),
                product.id.clone(),
            ))
        })
        .collect();

    let mut succeeded = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => succeeded += 1,
            Err(StoreError::Conflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(succeeded, 3);
    assert_eq!(conflicts, 2);
    let loaded = store.get_product(&product.id).await.unwrap().unwrap();
    assert_eq!(loaded.quantity, 0);
    assert_eq!(store.list_orders_for_user(&user.id).await.unwrap().len(), 3);
}
