//! Domain layer for order fulfillment.
//!
//! This crate provides the services that sit on top of the stores:
//! - `OrderService` for atomic, oversell-free order placement
//! - `ProductService` for catalog maintenance
//! - `UserService` for registration with hashed credentials
//! - `DomainError` with the stable error categories callers map to responses

pub mod error;
pub mod observer;
pub mod order;
pub mod product;
pub mod user;

pub use error::{DomainError, ErrorKind};
pub use observer::{NoopObserver, OrderObserver, TracingObserver};
pub use order::{CreateOrder, OrderError, OrderLine, OrderService};
pub use product::{CreateProduct, ProductService};
pub use user::{Argon2Hasher, PasswordHasher, RegisterUser, UserService};
