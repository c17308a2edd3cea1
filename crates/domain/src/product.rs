//! Catalog maintenance.

use common::{NewProduct, Product, ProductId};
use rust_decimal::Decimal;
use store::ProductStore;

use crate::error::DomainError;

/// Command to add a product to the catalog.
#[derive(Debug, Clone, Default)]
pub struct CreateProduct {
    pub description: String,
    pub tags: Vec<String>,
    pub quantity: i64,
    pub price: Decimal,
}

impl CreateProduct {
    fn validate(&self) -> Result<(), DomainError> {
        if self.description.trim().is_empty() {
            return Err(DomainError::invalid("description is required"));
        }
        if self.quantity < 0 {
            return Err(DomainError::invalid("quantity cannot be negative"));
        }
        validate_price(self.price)
    }
}

/// Largest number of decimal places a price may carry.
pub const PRICE_SCALE: u32 = 2;

fn validate_price(price: Decimal) -> Result<(), DomainError> {
    if price <= Decimal::ZERO {
        return Err(DomainError::invalid("price must be positive"));
    }
    if price.normalize().scale() > PRICE_SCALE {
        return Err(DomainError::invalid(
            "price must have at most 2 decimal places",
        ));
    }
    Ok(())
}

/// Service for creating and reading catalog products.
pub struct ProductService<S: ProductStore> {
    store: S,
}

impl<S: ProductStore> ProductService<S> {
    /// Creates a new product service.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds a product with its initial stock.
    #[tracing::instrument(skip(self, cmd), fields(quantity = cmd.quantity, price = %cmd.price))]
    pub async fn create(&self, cmd: CreateProduct) -> Result<Product, DomainError> {
        cmd.validate()?;

        let tags = cmd
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let product = self
            .store
            .create_product(NewProduct {
                description: cmd.description.trim().to_string(),
                tags,
                quantity: cmd.quantity,
                price: cmd.price,
                ..Default::default()
            })
            .await?;

        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// Loads a product by id.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: &ProductId) -> Result<Product, DomainError> {
        if id.is_blank() {
            return Err(DomainError::invalid("id is required"));
        }
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", id))
    }

    /// Changes a product's unit price. Orders already placed keep the price
    /// they captured.
    #[tracing::instrument(skip(self))]
    pub async fn update_price(&self, id: &ProductId, price: Decimal) -> Result<Product, DomainError> {
        if id.is_blank() {
            return Err(DomainError::invalid("id is required"));
        }
        validate_price(price)?;
        Ok(self.store.update_price(id, price).await?)
    }
}
