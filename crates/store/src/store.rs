use async_trait::async_trait;
use common::{NewOrder, NewProduct, NewUser, Order, OrderId, Product, ProductId, User, UserId};
use rust_decimal::Decimal;

use crate::Result;
use crate::tx::{Tx, TxBackend, TxManager};

/// Durable storage for user records.
#[async_trait]
pub trait UserStore: TxBackend {
    /// Persists a new user.
    ///
    /// Fails with `Conflict` if a user with the same email (compared
    /// case-insensitively) already exists.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Looks up a user by id outside of any transaction.
    async fn get_user(&self, id: &UserId) -> Result<Option<User>>;

    /// Looks up a user by email, ignoring case.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Looks up a user by id through an open transaction.
    async fn get_user_in(&self, tx: &mut Tx<Self::Conn>, id: &UserId) -> Result<Option<User>>;
}

/// Durable storage for product records and their stock.
#[async_trait]
pub trait ProductStore: TxBackend {
    /// Persists a new product.
    async fn create_product(&self, product: NewProduct) -> Result<Product>;

    /// Non-locking point read.
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Reads the given products while taking an exclusive row lock on each.
    ///
    /// Blocks until every matching row can be locked; a concurrent transaction
    /// locking the same rows waits until `tx` commits or rolls back. Unknown
    /// ids are silently omitted, callers detect them by comparing counts.
    async fn lock_products_for_update(
        &self,
        tx: &mut Tx<Self::Conn>,
        ids: &[ProductId],
    ) -> Result<Vec<Product>>;

    /// Atomically adds `delta` to the product's quantity and bumps `updated_at`.
    ///
    /// Fails with `Conflict` if the quantity would become negative and with
    /// `NotFound` if the product does not exist.
    async fn apply_stock_delta(
        &self,
        tx: &mut Tx<Self::Conn>,
        id: &ProductId,
        delta: i64,
    ) -> Result<()>;

    /// Changes the unit price. Orders already placed keep their captured price.
    async fn update_price(&self, id: &ProductId, price: Decimal) -> Result<Product>;
}

/// Durable, append-only storage for orders and their lines.
#[async_trait]
pub trait OrderStore: TxBackend {
    /// Persists an order and all of its lines as one unit inside `tx`.
    ///
    /// Assigns missing ids and the creation timestamp, and stamps each line
    /// with the order back-reference.
    async fn create_order(&self, tx: &mut Tx<Self::Conn>, order: NewOrder) -> Result<Order>;

    /// Loads an order with its lines in their original sequence.
    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>>;

    /// Lists a user's orders, newest first.
    async fn list_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>>;
}

/// A complete backend: every store plus the transaction coordinator, sharing
/// one connection type.
pub trait Storage: UserStore + ProductStore + OrderStore + TxManager + Clone + 'static {}

impl<T> Storage for T where T: UserStore + ProductStore + OrderStore + TxManager + Clone + 'static {}
