//! Hooks for reporting the outcome of order placement.

use std::time::Duration;

use common::{Order, UserId};

use crate::error::{DomainError, ErrorKind};

/// Receives the outcome of every order placement attempt.
///
/// Passed explicitly to [`OrderService`](crate::OrderService) so that callers
/// decide where logs and metrics go.
pub trait OrderObserver: Send + Sync {
    /// Called after an order has been committed.
    fn order_created(&self, order: &Order, elapsed: Duration);

    /// Called after an order request failed and any open transaction was rolled back.
    fn order_rejected(&self, user_id: &UserId, error: &DomainError, elapsed: Duration);
}

/// Reports outcomes through `tracing` and the global `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl OrderObserver for TracingObserver {
    fn order_created(&self, order: &Order, elapsed: Duration) {
        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            total = %order.total_price,
            items = order.items.len(),
            "order created"
        );
        metrics::counter!("orders_created_total").increment(1);
        metrics::histogram!("order_create_duration_seconds").record(elapsed.as_secs_f64());
    }

    fn order_rejected(&self, user_id: &UserId, error: &DomainError, elapsed: Duration) {
        let kind = error.kind();
        match kind {
            ErrorKind::Internal => {
                tracing::error!(user_id = %user_id, error = %error, "order failed");
            }
            _ => {
                tracing::info!(user_id = %user_id, kind = %kind, error = %error, "order rejected");
            }
        }
        metrics::counter!("orders_rejected_total", "kind" => kind.as_str()).increment(1);
        metrics::histogram!("order_create_duration_seconds").record(elapsed.as_secs_f64());
    }
}

/// Discards every outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl OrderObserver for NoopObserver {
    fn order_created(&self, _order: &Order, _elapsed: Duration) {}

    fn order_rejected(&self, _user_id: &UserId, _error: &DomainError, _elapsed: Duration) {}
}
