//! Transactional storage for users, products and orders.
//!
//! Every backend implements the [`UserStore`], [`ProductStore`] and
//! [`OrderStore`] traits plus the [`TxManager`] coordinator. Writes that must
//! be atomic take a [`Tx`] handle obtained from [`with_tx`] or
//! [`TxManager::begin`].

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod tx;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, MemoryConn};
pub use postgres::PostgresStore;
pub use store::{OrderStore, ProductStore, Storage, UserStore};
pub use tx::{Tx, TxBackend, TxManager, with_tx};
