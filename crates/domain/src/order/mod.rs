//! Order placement and the request types it accepts.

mod service;

pub use service::OrderService;

use common::{ProductId, UserId};
use thiserror::Error;

use crate::error::DomainError;

/// Errors raised while validating or fulfilling an order request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The requesting user id is blank.
    #[error("user id is required")]
    UserIdRequired,

    /// The request has no lines.
    #[error("order items are required")]
    NoItems,

    /// A line has a blank product id.
    #[error("product id is required")]
    ProductIdRequired,

    /// A line asks for zero or fewer units.
    #[error("quantity must be positive")]
    InvalidQuantity { quantity: i64 },

    /// The combined quantity or total cannot be represented.
    #[error("order quantity is too large")]
    QuantityOverflow,

    /// A product does not hold enough stock for the requested quantity.
    #[error("insufficient stock")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },
}

impl From<OrderError> for DomainError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::InsufficientStock { .. } => DomainError::Conflict(e.to_string()),
            other => DomainError::InvalidInput(other.to_string()),
        }
    }
}

/// One requested line of an order: a product and how many units of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl OrderLine {
    /// Creates a new order line.
    pub fn new(product_id: impl Into<ProductId>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Command to place an order for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOrder {
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
}

impl CreateOrder {
    /// Creates a new place-order command.
    pub fn new(user_id: impl Into<UserId>, lines: Vec<OrderLine>) -> Self {
        Self {
            user_id: user_id.into(),
            lines,
        }
    }

    /// Adds a line to the command.
    pub fn with_line(mut self, product_id: impl Into<ProductId>, quantity: i64) -> Self {
        self.lines.push(OrderLine::new(product_id, quantity));
        self
    }

    /// Checks the request shape and merges lines that name the same product.
    ///
    /// Merged lines keep the position of the first occurrence and carry the
    /// summed quantity, so the stock check sees the combined demand.
    pub fn validate(&self) -> Result<Vec<OrderLine>, OrderError> {
        if self.user_id.is_blank() {
            return Err(OrderError::UserIdRequired);
        }
        if self.lines.is_empty() {
            return Err(OrderError::NoItems);
        }

        let mut merged: Vec<OrderLine> = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            if line.product_id.is_blank() {
                return Err(OrderError::ProductIdRequired);
            }
            if line.quantity <= 0 {
                return Err(OrderError::InvalidQuantity {
                    quantity: line.quantity,
                });
            }

            match merged.iter_mut().find(|m| m.product_id == line.product_id) {
                Some(existing) => {
                    existing.quantity = existing
                        .quantity
                        .checked_add(line.quantity)
                        .ok_or(OrderError::QuantityOverflow)?;
                }
                None => merged.push(line.clone()),
            }
        }

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_user_is_rejected() {
        let cmd = CreateOrder::new("  ", vec![]).with_line("p1", 1);
        assert_eq!(cmd.validate(), Err(OrderError::UserIdRequired));
    }

    #[test]
    fn empty_lines_are_rejected() {
        let cmd = CreateOrder::new("u1", vec![]);
        assert_eq!(cmd.validate(), Err(OrderError::NoItems));
    }

    #[test]
    fn blank_product_is_rejected() {
        let cmd = CreateOrder::new("u1", vec![]).with_line("p1", 1).with_line("", 2);
        assert_eq!(cmd.validate(), Err(OrderError::ProductIdRequired));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        for quantity in [0, -3] {
            let cmd = CreateOrder::new("u1", vec![]).with_line("p1", quantity);
            assert_eq!(
                cmd.validate(),
                Err(OrderError::InvalidQuantity { quantity })
            );
        }
    }

    #[test]
    fn duplicate_products_are_merged_in_first_seen_order() {
        let cmd = CreateOrder::new("u1", vec![])
            .with_line("b", 2)
            .with_line("a", 1)
            .with_line("b", 3);

        let merged = cmd.validate().unwrap();
        assert_eq!(merged, vec![OrderLine::new("b", 5), OrderLine::new("a", 1)]);
    }

    #[test]
    fn merged_quantity_overflow_is_rejected() {
        let cmd = CreateOrder::new("u1", vec![])
            .with_line("p1", i64::MAX)
            .with_line("p1", 1);
        assert_eq!(cmd.validate(), Err(OrderError::QuantityOverflow));
    }

    #[test]
    fn errors_map_to_domain_categories() {
        let invalid: DomainError = OrderError::NoItems.into();
        assert_eq!(invalid.kind(), crate::ErrorKind::InvalidInput);
        assert_eq!(invalid.to_string(), "order items are required");

        let conflict: DomainError = OrderError::InsufficientStock {
            product_id: ProductId::new("p1"),
            requested: 2,
            available: 1,
        }
        .into();
        assert_eq!(conflict.kind(), crate::ErrorKind::Conflict);
        assert_eq!(conflict.to_string(), "insufficient stock");
    }
}
