//! Catalog endpoints.

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Product, ProductId};
use domain::CreateProduct;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store::Storage;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::format_price;

// -- Request types --

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct CreateProductRequest {
    pub description: String,
    pub tags: Vec<String>,
    pub quantity: i64,
    /// Decimal string, e.g. `"12.50"`.
    pub price: String,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct UpdatePriceRequest {
    pub price: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub description: String,
    pub tags: Vec<String>,
    pub quantity: i64,
    pub price: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            price: format_price(&product.price),
            id: product.id.into_string(),
            description: product.description,
            tags: product.tags,
            quantity: product.quantity,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

fn parse_price(raw: &str) -> Result<Decimal, ApiError> {
    Decimal::from_str(raw.trim()).map_err(|_| ApiError::BadRequest("invalid price".to_string()))
}

// -- Handlers --

/// POST /products: add a product with its initial stock.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let Json(req) = payload?;
    let price = parse_price(&req.price)?;

    let product = state
        .products
        .create(CreateProduct {
            description: req.description,
            tags: req.tags,
            quantity: req.quantity,
            price,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(product.into())))
}

/// GET /products/:id: load a product by ID.
#[tracing::instrument(skip(state))]
pub async fn get<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state.products.get(&ProductId::new(id.trim())).await?;
    Ok(Json(product.into()))
}

/// PATCH /products/:id/price: change a product's unit price.
#[tracing::instrument(skip(state, payload))]
pub async fn update_price<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdatePriceRequest>, JsonRejection>,
) -> Result<Json<ProductResponse>, ApiError> {
    let Json(req) = payload?;
    let price = parse_price(&req.price)?;

    let product = state
        .products
        .update_price(&ProductId::new(id.trim()), price)
        .await?;
    Ok(Json(product.into()))
}
