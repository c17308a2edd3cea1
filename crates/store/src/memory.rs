use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{
    NewOrder, NewProduct, NewUser, Order, OrderId, OrderItem, OrderItemId, Product, ProductId,
    User, UserId,
};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Result, StoreError,
    store::{OrderStore, ProductStore, UserStore},
    tx::{Tx, TxBackend, TxManager},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
}

impl Tables {
    fn create_user(&mut self, user: NewUser) -> Result<User> {
        let email = user.email.to_lowercase();
        if self.users.values().any(|u| u.email.to_lowercase() == email) {
            return Err(StoreError::Conflict("user already exists".to_string()));
        }

        let user = User {
            id: user.id.unwrap_or_else(UserId::generate),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            age: user.age,
            is_married: user.is_married,
            password_hash: user.password_hash,
            created_at: user.created_at.unwrap_or_else(Utc::now),
        };
        self.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    fn create_product(&mut self, product: NewProduct) -> Product {
        let created_at = product.created_at.unwrap_or_else(Utc::now);
        let product = Product {
            id: product.id.unwrap_or_else(ProductId::generate),
            description: product.description,
            tags: product.tags,
            quantity: product.quantity,
            price: product.price,
            created_at,
            updated_at: created_at,
        };
        self.products.insert(product.id.clone(), product.clone());
        product
    }

    fn apply_stock_delta(&mut self, id: &ProductId, delta: i64) -> Result<()> {
        let product = self
            .products
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("product", id))?;

        match product.quantity.checked_add(delta) {
            Some(quantity) if quantity >= 0 => {
                product.quantity = quantity;
                product.updated_at = Utc::now();
                Ok(())
            }
            _ => Err(StoreError::insufficient_stock()),
        }
    }

    fn create_order(&mut self, order: NewOrder) -> Result<Order> {
        // Same referential checks the relational schema enforces with foreign keys.
        if !self.users.contains_key(&order.user_id) {
            return Err(StoreError::not_found("user", &order.user_id));
        }
        if let Some(item) = order
            .items
            .iter()
            .find(|item| !self.products.contains_key(&item.product_id))
        {
            return Err(StoreError::not_found("product", &item.product_id));
        }

        let order_id = order.id.unwrap_or_else(OrderId::generate);
        let items = order
            .items
            .into_iter()
            .map(|item| OrderItem {
                id: item.id.unwrap_or_else(OrderItemId::generate),
                order_id: order_id.clone(),
                product_id: item.product_id,
                quantity: item.quantity,
                price: item.price,
            })
            .collect();

        let order = Order {
            id: order_id,
            user_id: order.user_id,
            created_at: order.created_at.unwrap_or_else(Utc::now),
            total_price: order.total_price,
            items,
        };
        self.orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }
}

/// Connection held by an in-memory transaction.
///
/// Owns the store-wide lock for the whole transaction body together with a
/// copy of the tables taken at `begin`. Unless the transaction is committed,
/// dropping the connection restores that copy.
pub struct MemoryConn {
    guard: OwnedMutexGuard<Tables>,
    snapshot: Option<Tables>,
}

impl MemoryConn {
    fn tables(&mut self) -> &mut Tables {
        &mut self.guard
    }
}

impl Drop for MemoryConn {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}

/// In-memory store implementation for testing.
///
/// Provides the same contract as the PostgreSQL implementation, but instead
/// of row locks a single mutex is held for the entire transaction body. This
/// also serializes orders for unrelated products, which is weaker but keeps
/// the no-oversell guarantee.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of products stored.
    pub async fn product_count(&self) -> usize {
        self.tables.lock().await.products.len()
    }

    /// Returns the number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }

    /// Returns the number of order lines stored across all orders.
    pub async fn order_item_count(&self) -> usize {
        self.tables
            .lock()
            .await
            .orders
            .values()
            .map(|o| o.items.len())
            .sum()
    }

    /// Clears all users, products and orders.
    pub async fn clear(&self) {
        let mut tables = self.tables.lock().await;
        *tables = Tables::default();
    }
}

impl TxBackend for InMemoryStore {
    type Conn = MemoryConn;
}

#[async_trait]
impl TxManager for InMemoryStore {
    async fn begin(&self) -> Result<Tx<MemoryConn>> {
        let guard = self.tables.clone().lock_owned().await;
        let snapshot = (*guard).clone();
        Ok(Tx::new(MemoryConn {
            guard,
            snapshot: Some(snapshot),
        }))
    }

    async fn commit(&self, tx: Tx<MemoryConn>) -> Result<()> {
        let mut conn = tx.into_inner();
        conn.snapshot = None;
        Ok(())
    }

    async fn rollback(&self, tx: Tx<MemoryConn>) -> Result<()> {
        drop(tx);
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        self.tables.lock().await.create_user(user)
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.tables.lock().await.users.get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_lowercase();
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.to_lowercase() == email)
            .cloned())
    }

    async fn get_user_in(&self, tx: &mut Tx<MemoryConn>, id: &UserId) -> Result<Option<User>> {
        Ok(tx.conn().tables().users.get(id).cloned())
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        Ok(self.tables.lock().await.create_product(product))
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.tables.lock().await.products.get(id).cloned())
    }

    async fn lock_products_for_update(
        &self,
        tx: &mut Tx<MemoryConn>,
        ids: &[ProductId],
    ) -> Result<Vec<Product>> {
        // The whole store is already locked by `tx`.
        let tables = tx.conn().tables();
        let mut products: Vec<Product> = ids
            .iter()
            .filter_map(|id| tables.products.get(id).cloned())
            .collect();
        products.sort_by(|a, b| a.id.cmp(&b.id));
        products.dedup_by(|a, b| a.id == b.id);
        Ok(products)
    }

    async fn apply_stock_delta(
        &self,
        tx: &mut Tx<MemoryConn>,
        id: &ProductId,
        delta: i64,
    ) -> Result<()> {
        tx.conn().tables().apply_stock_delta(id, delta)
    }

    async fn update_price(&self, id: &ProductId, price: Decimal) -> Result<Product> {
        let mut tables = self.tables.lock().await;
        let product = tables
            .products
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("product", id))?;
        product.price = price;
        product.updated_at = Utc::now();
        Ok(product.clone())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn create_order(&self, tx: &mut Tx<MemoryConn>, order: NewOrder) -> Result<Order> {
        tx.conn().tables().create_order(order)
    }

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>> {
        Ok(self.tables.lock().await.orders.get(id).cloned())
    }

    async fn list_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| &o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}
