//! Transactional order placement.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use common::{NewOrder, NewOrderItem, Order, OrderId, Product, ProductId, UserId};
use rust_decimal::Decimal;
use store::{Storage, Tx, with_tx};

use crate::error::DomainError;
use crate::observer::OrderObserver;

use super::{CreateOrder, OrderError, OrderLine};

/// Service for placing and reading orders.
///
/// Placing an order locks every referenced product row, checks and
/// decrements stock, and persists the order with its lines in one
/// transaction. Either all of it happens or none of it does.
pub struct OrderService<S: Storage> {
    store: S,
    observer: Arc<dyn OrderObserver>,
}

impl<S: Storage> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S, observer: Arc<dyn OrderObserver>) -> Self {
        Self { store, observer }
    }

    /// Places an order in a new transaction.
    #[tracing::instrument(skip(self, cmd), fields(user_id = %cmd.user_id, lines = cmd.lines.len()))]
    pub async fn create(&self, cmd: CreateOrder) -> Result<Order, DomainError> {
        let started = Instant::now();
        let user_id = cmd.user_id.clone();

        let result = self.place(cmd).await;
        self.report(&user_id, &result, started);
        result
    }

    /// Places an order inside a transaction owned by the caller.
    ///
    /// Nothing is committed here. An error leaves `tx` usable only for
    /// rollback, and the caller's commit makes the order durable together
    /// with whatever else it wrote through `tx`.
    ///
    /// The observer is not notified: the outcome is only final once the
    /// caller commits or rolls back.
    #[tracing::instrument(skip(self, tx, cmd), fields(user_id = %cmd.user_id, lines = cmd.lines.len()))]
    pub async fn create_in(
        &self,
        tx: &mut Tx<S::Conn>,
        cmd: CreateOrder,
    ) -> Result<Order, DomainError> {
        let order = self.place_in(tx, cmd).await?;
        tracing::debug!(order_id = %order.id, "order placed, pending commit");
        Ok(order)
    }

    /// Loads a persisted order with its lines.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, order_id: &OrderId) -> Result<Order, DomainError> {
        if order_id.is_blank() {
            return Err(DomainError::invalid("id is required"));
        }
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_id))
    }

    /// Lists a user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, DomainError> {
        if user_id.is_blank() {
            return Err(OrderError::UserIdRequired.into());
        }
        Ok(self.store.list_orders_for_user(user_id).await?)
    }

    async fn place(&self, cmd: CreateOrder) -> Result<Order, DomainError> {
        let lines = cmd.validate()?;
        if self.store.get_user(&cmd.user_id).await?.is_none() {
            return Err(DomainError::not_found("user", &cmd.user_id));
        }

        let store = self.store.clone();
        let user_id = cmd.user_id;
        with_tx(&self.store, move |tx| {
            Box::pin(async move { fulfill(&store, tx, user_id, lines).await })
        })
        .await
    }

    async fn place_in(&self, tx: &mut Tx<S::Conn>, cmd: CreateOrder) -> Result<Order, DomainError> {
        let lines = cmd.validate()?;
        if self.store.get_user_in(tx, &cmd.user_id).await?.is_none() {
            return Err(DomainError::not_found("user", &cmd.user_id));
        }

        let store = self.store.clone();
        let user_id = cmd.user_id;
        tx.with_tx(move |tx| Box::pin(async move { fulfill(&store, tx, user_id, lines).await }))
            .await
    }

    fn report(&self, user_id: &UserId, result: &Result<Order, DomainError>, started: Instant) {
        let elapsed = started.elapsed();
        match result {
            Ok(order) => self.observer.order_created(order, elapsed),
            Err(e) => self.observer.order_rejected(user_id, e, elapsed),
        }
    }
}

/// Locks, checks and decrements stock for `lines`, then persists the order.
///
/// `lines` must already be validated and merged so every product appears once.
async fn fulfill<S: Storage>(
    store: &S,
    tx: &mut Tx<S::Conn>,
    user_id: UserId,
    lines: Vec<OrderLine>,
) -> Result<Order, DomainError> {
    let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id.clone()).collect();
    let locked = store.lock_products_for_update(tx, &ids).await?;
    let products: HashMap<&ProductId, &Product> = locked.iter().map(|p| (&p.id, p)).collect();

    // Check and price every line before writing anything.
    let mut total = Decimal::ZERO;
    let mut items = Vec::with_capacity(lines.len());
    for line in &lines {
        let product = products
            .get(&line.product_id)
            .copied()
            .ok_or_else(|| DomainError::not_found("product", &line.product_id))?;
        if product.quantity < line.quantity {
            return Err(OrderError::InsufficientStock {
                product_id: product.id.clone(),
                requested: line.quantity,
                available: product.quantity,
            }
            .into());
        }

        let item = NewOrderItem {
            id: None,
            product_id: product.id.clone(),
            quantity: line.quantity,
            price: product.price,
        };
        total = item
            .line_total()
            .and_then(|line_total| total.checked_add(line_total))
            .ok_or(OrderError::QuantityOverflow)?;
        items.push(item);
    }

    for item in &items {
        store
            .apply_stock_delta(tx, &item.product_id, -item.quantity)
            .await?;
    }

    let order = store
        .create_order(
            tx,
            NewOrder {
                id: None,
                user_id,
                created_at: None,
                total_price: total,
                items,
            },
        )
        .await?;

    tracing::debug!(order_id = %order.id, depth = tx.depth(), "order persisted");
    Ok(order)
}
