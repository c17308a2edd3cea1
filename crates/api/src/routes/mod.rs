//! HTTP handlers.

pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;
pub mod users;

use rust_decimal::Decimal;

/// Renders a monetary amount with exactly two decimals.
pub(crate) fn format_price(amount: &Decimal) -> String {
    format!("{amount:.2}")
}
