//! Scoped units of work over a store backend.

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::{Result, StoreError};

/// A transaction handle passed to store operations that must run atomically.
///
/// The handle is reentrant: [`Tx::with_tx`] runs a nested unit of work on the
/// same underlying transaction instead of opening a second one. Only the root
/// scope (depth 0) is ever committed or rolled back.
pub struct Tx<C> {
    conn: C,
    depth: u32,
}

impl<C> Tx<C> {
    /// Wraps a freshly opened backend transaction.
    pub fn new(conn: C) -> Self {
        Self { conn, depth: 0 }
    }

    /// Returns the backend connection bound to this transaction.
    pub fn conn(&mut self) -> &mut C {
        &mut self.conn
    }

    /// Consumes the handle, returning the backend connection.
    pub fn into_inner(self) -> C {
        self.conn
    }

    /// Nesting depth of the scope currently running on this handle.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Returns true when no delegated scope is active.
    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    /// Runs `f` inside the already-open transaction.
    ///
    /// This is the nested form of [`with_tx`]: it neither commits nor rolls
    /// back, it only hands the same handle to `f`. An error returned by `f`
    /// is propagated so the owner of the root scope rolls everything back.
    pub async fn with_tx<T, E, F>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut Tx<C>) -> BoxFuture<'t, std::result::Result<T, E>> + Send,
    {
        self.depth += 1;
        let result = f(&mut *self).await;
        self.depth -= 1;
        result
    }
}

impl<C> std::fmt::Debug for Tx<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tx").field("depth", &self.depth).finish()
    }
}

/// Ties a store to the connection type its transactions run on.
///
/// Every store trait of one backend shares this type, so a single [`Tx`]
/// can be used across the user, product and order stores.
pub trait TxBackend: Send + Sync {
    /// Backend connection held for the lifetime of a transaction.
    ///
    /// Dropping it without committing must roll the transaction back.
    type Conn: Send + 'static;
}

/// Begins, commits and rolls back transactions.
#[async_trait]
pub trait TxManager: TxBackend {
    /// Opens a new root transaction.
    async fn begin(&self) -> Result<Tx<Self::Conn>>;

    /// Makes every write performed through `tx` durable and releases its locks.
    async fn commit(&self, tx: Tx<Self::Conn>) -> Result<()>;

    /// Discards every write performed through `tx` and releases its locks.
    async fn rollback(&self, tx: Tx<Self::Conn>) -> Result<()>;
}

/// Runs `f` in a new transaction: commits if it returns `Ok`, rolls back otherwise.
///
/// If the returned future is dropped before completion, the open transaction
/// is dropped with it and rolled back by the backend.
pub async fn with_tx<M, T, E, F>(manager: &M, f: F) -> std::result::Result<T, E>
where
    M: TxManager + ?Sized,
    T: Send,
    E: From<StoreError> + Send,
    F: for<'t> FnOnce(&'t mut Tx<M::Conn>) -> BoxFuture<'t, std::result::Result<T, E>> + Send,
{
    let mut tx = manager.begin().await?;

    match f(&mut tx).await {
        Ok(value) => {
            manager.commit(tx).await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = manager.rollback(tx).await {
                tracing::error!(error = %rollback_err, "rollback tx");
            }
            Err(err)
        }
    }
}
