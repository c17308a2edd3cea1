//! Order placement endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Order, OrderId, OrderItem};
use domain::{CreateOrder, OrderLine};
use serde::{Deserialize, Serialize};
use store::Storage;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::format_price;

// -- Request types --

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub total_price: String,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub id: String,
    pub product_id: String,
    pub quantity: i64,
    pub price: String,
    pub line_total: String,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            line_total: format_price(&item.line_total()),
            price: format_price(&item.price),
            id: item.id.into_string(),
            product_id: item.product_id.into_string(),
            quantity: item.quantity,
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            total_price: format_price(&order.total_price),
            id: order.id.into_string(),
            user_id: order.user_id.into_string(),
            created_at: order.created_at,
            items: order.items.into_iter().map(OrderItemResponse::from).collect(),
        }
    }
}

// -- Handlers --

/// POST /orders: place an order, reserving stock for every line.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let Json(req) = payload?;

    let lines = req
        .items
        .into_iter()
        .map(|item| OrderLine::new(item.product_id.trim(), item.quantity))
        .collect();
    let order = state
        .orders
        .create(CreateOrder::new(req.user_id.trim(), lines))
        .await?;

    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders/:id: load an order with its lines.
#[tracing::instrument(skip(state))]
pub async fn get<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.get(&OrderId::new(id.trim())).await?;
    Ok(Json(order.into()))
}
