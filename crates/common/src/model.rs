//! Records owned by the stores and the payloads used to create them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{OrderId, OrderItemId, ProductId, UserId};

/// A registered user. Immutable after registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub is_married: bool,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Returns the first and last name joined by a space, skipping empty parts.
    pub fn full_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (true, true) => String::new(),
            (true, false) => self.last_name.clone(),
            (false, true) => self.first_name.clone(),
            (false, false) => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

/// A catalog product with its available stock.
///
/// `quantity` is never negative; it only changes through stock deltas
/// applied inside an order transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub description: String,
    pub tags: Vec<String>,
    pub quantity: i64,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A committed order. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub total_price: Decimal,
    pub items: Vec<OrderItem>,
}

/// One line of an order. `price` is the unit price captured when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub price: Decimal,
}

impl OrderItem {
    /// Returns quantity times unit price.
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Payload for creating a user. The store assigns `id` and `created_at` when absent.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub id: Option<UserId>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub is_married: bool,
    pub password_hash: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Payload for creating a product. The store assigns `id` and timestamps when absent.
#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub id: Option<ProductId>,
    pub description: String,
    pub tags: Vec<String>,
    pub quantity: i64,
    pub price: Decimal,
    pub created_at: Option<DateTime<Utc>>,
}

/// Payload for persisting an order together with its lines.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Option<OrderId>,
    pub user_id: UserId,
    pub created_at: Option<DateTime<Utc>>,
    pub total_price: Decimal,
    pub items: Vec<NewOrderItem>,
}

/// A line of a [`NewOrder`]. The order back-reference is stamped by the store.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub id: Option<OrderItemId>,
    pub product_id: ProductId,
    pub quantity: i64,
    pub price: Decimal,
}

impl NewOrderItem {
    /// Returns quantity times unit price, or `None` if it cannot be represented.
    pub fn line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}
