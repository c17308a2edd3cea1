use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use common::{
    NewOrder, NewProduct, NewUser, Order, OrderId, OrderItem, OrderItemId, Product, ProductId,
    User, UserId,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgPoolOptions, postgres::PgRow};

use crate::{
    Result, StoreError,
    store::{OrderStore, ProductStore, UserStore},
    tx::{Tx, TxBackend, TxManager},
};

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, age, is_married, password_hash, created_at";
const PRODUCT_COLUMNS: &str = "id, description, tags, quantity, price, created_at, updated_at";

/// PostgreSQL-backed store implementation.
///
/// Stock safety relies on `SELECT ... FOR UPDATE`: the row locks are held by
/// the database until the owning transaction ends, so the guarantee holds
/// across any number of service instances sharing the database.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool to `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_user(row: PgRow) -> Result<User> {
        Ok(User {
            id: UserId::from(row.try_get::<String, _>("id")?),
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            age: row.try_get("age")?,
            is_married: row.try_get("is_married")?,
            password_hash: row.try_get("password_hash")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from(row.try_get::<String, _>("id")?),
            description: row.try_get("description")?,
            tags: row.try_get("tags")?,
            quantity: row.try_get("quantity")?,
            price: row.try_get("price")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order_item(row: &PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            id: OrderItemId::from(row.try_get::<String, _>("id")?),
            order_id: OrderId::from(row.try_get::<String, _>("order_id")?),
            product_id: ProductId::from(row.try_get::<String, _>("product_id")?),
            quantity: row.try_get("quantity")?,
            price: row.try_get("price")?,
        })
    }

    /// Loads the orders for the given rows and attaches their lines in sequence.
    async fn attach_items(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let ids: Vec<String> = rows
            .iter()
            .map(|row| row.try_get::<String, _>("id"))
            .collect::<std::result::Result<_, _>>()?;

        let item_rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity, price
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in &item_rows {
            let item = Self::row_to_order_item(row)?;
            items.entry(item.order_id.clone()).or_default().push(item);
        }

        rows.into_iter()
            .map(|row| {
                let id = OrderId::from(row.try_get::<String, _>("id")?);
                Ok(Order {
                    items: items.remove(&id).unwrap_or_default(),
                    user_id: UserId::from(row.try_get::<String, _>("user_id")?),
                    created_at: row.try_get("created_at")?,
                    total_price: row.try_get("total_price")?,
                    id,
                })
            })
            .collect()
    }
}

/// Maps foreign key violations to the missing entity they reference.
fn map_order_error(e: sqlx::Error, order: &NewOrder) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_foreign_key_violation()
    {
        return match db_err.constraint() {
            Some("orders_user_id_fkey") => StoreError::not_found("user", &order.user_id),
            _ => StoreError::not_found(
                "product",
                order
                    .items
                    .iter()
                    .map(|i| i.product_id.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
        };
    }
    StoreError::Database(e)
}

impl TxBackend for PostgresStore {
    type Conn = Transaction<'static, Postgres>;
}

#[async_trait]
impl TxManager for PostgresStore {
    async fn begin(&self) -> Result<Tx<Self::Conn>> {
        Ok(Tx::new(self.pool.begin().await?))
    }

    async fn commit(&self, tx: Tx<Self::Conn>) -> Result<()> {
        tx.into_inner().commit().await?;
        Ok(())
    }

    async fn rollback(&self, tx: Tx<Self::Conn>) -> Result<()> {
        tx.into_inner().rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let id = user.id.unwrap_or_else(UserId::generate);
        let created_at = user.created_at.unwrap_or_else(Utc::now);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users ({USER_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id.as_str())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.age)
        .bind(user.is_married)
        .bind(&user.password_hash)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::Conflict("user already exists".to_string());
            }
            StoreError::Database(e)
        })?;

        Self::row_to_user(row)
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_user).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_user).transpose()
    }

    async fn get_user_in(&self, tx: &mut Tx<Self::Conn>, id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_str())
            .fetch_optional(&mut **tx.conn())
            .await?;
        row.map(Self::row_to_user).transpose()
    }
}

#[async_trait]
impl ProductStore for PostgresStore {
    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let id = product.id.unwrap_or_else(ProductId::generate);
        let created_at = product.created_at.unwrap_or_else(Utc::now);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products ({PRODUCT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_str())
        .bind(&product.description)
        .bind(&product.tags)
        .bind(product.quantity)
        .bind(product.price)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_product(row)
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_product).transpose()
    }

    async fn lock_products_for_update(
        &self,
        tx: &mut Tx<Self::Conn>,
        ids: &[ProductId],
    ) -> Result<Vec<Product>> {
        let ids: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();

        // Locks are taken in id order so multi-product orders cannot deadlock
        // each other.
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#
        ))
        .bind(ids)
        .fetch_all(&mut **tx.conn())
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn apply_stock_delta(
        &self,
        tx: &mut Tx<Self::Conn>,
        id: &ProductId,
        delta: i64,
    ) -> Result<()> {
        let updated: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET quantity = quantity + $2, updated_at = $3
            WHERE id = $1 AND quantity + $2 >= 0
            RETURNING id
            "#,
        )
        .bind(id.as_str())
        .bind(delta)
        .bind(Utc::now())
        .fetch_optional(&mut **tx.conn())
        .await?;

        if updated.is_some() {
            return Ok(());
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
                .bind(id.as_str())
                .fetch_one(&mut **tx.conn())
                .await?;

        if exists {
            Err(StoreError::insufficient_stock())
        } else {
            Err(StoreError::not_found("product", id))
        }
    }

    async fn update_price(&self, id: &ProductId, price: Decimal) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE products
            SET price = $2, updated_at = $3
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_str())
        .bind(price)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_product(row),
            None => Err(StoreError::not_found("product", id)),
        }
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn create_order(&self, tx: &mut Tx<Self::Conn>, order: NewOrder) -> Result<Order> {
        let order_id = order.id.clone().unwrap_or_else(OrderId::generate);
        let created_at = order.created_at.unwrap_or_else(Utc::now);

        let row = sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, created_at, total_price)
            VALUES ($1, $2, $3, $4)
            RETURNING created_at, total_price
            "#,
        )
        .bind(order_id.as_str())
        .bind(order.user_id.as_str())
        .bind(created_at)
        .bind(order.total_price)
        .fetch_one(&mut **tx.conn())
        .await
        .map_err(|e| map_order_error(e, &order))?;

        let mut items = Vec::with_capacity(order.items.len());
        for (position, item) in order.items.iter().enumerate() {
            let item = OrderItem {
                id: item.id.clone().unwrap_or_else(OrderItemId::generate),
                order_id: order_id.clone(),
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                price: item.price,
            };

            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, position, product_id, quantity, price)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(item.id.as_str())
            .bind(item.order_id.as_str())
            .bind(position as i32)
            .bind(item.product_id.as_str())
            .bind(item.quantity)
            .bind(item.price)
            .execute(&mut **tx.conn())
            .await
            .map_err(|e| map_order_error(e, &order))?;

            items.push(item);
        }

        Ok(Order {
            id: order_id,
            user_id: order.user_id.clone(),
            created_at: row.try_get("created_at")?,
            total_price: row.try_get("total_price")?,
            items,
        })
    }

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>> {
        let rows = sqlx::query(
            "SELECT id, user_id, created_at, total_price FROM orders WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(self.attach_items(rows).await?.into_iter().next())
    }

    async fn list_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, created_at, total_price
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        self.attach_items(rows).await
    }
}
