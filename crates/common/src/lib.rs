//! Shared types for the inventory and ordering system.
//!
//! Identifiers are opaque strings: they are generated as UUIDs but never
//! parsed or assumed to be sequential.

pub mod model;
pub mod types;

pub use model::{
    NewOrder, NewOrderItem, NewProduct, NewUser, Order, OrderItem, Product, User,
};
pub use types::{OrderId, OrderItemId, ProductId, UserId};
