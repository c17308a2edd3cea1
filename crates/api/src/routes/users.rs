//! User registration endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{User, UserId};
use domain::RegisterUser;
use serde::{Deserialize, Serialize};
use store::Storage;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::orders::OrderResponse;

// -- Request types --

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct RegisterUserRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub age: i32,
    pub is_married: bool,
}

// -- Response types --

#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub age: i32,
    pub is_married: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            full_name: user.full_name(),
            id: user.id.into_string(),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            age: user.age,
            is_married: user.is_married,
            created_at: user.created_at,
        }
    }
}

// -- Handlers --

/// POST /users/register: register a new user.
#[tracing::instrument(skip(state, payload))]
pub async fn register<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let Json(req) = payload?;

    let user = state
        .users
        .register(RegisterUser {
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            password: req.password,
            age: req.age,
            is_married: req.is_married,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /users/:id: load a user by ID.
#[tracing::instrument(skip(state))]
pub async fn get<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users.get(&UserId::new(id.trim())).await?;
    Ok(Json(user.into()))
}

/// GET /users/:id/orders: list a user's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn orders<S: Storage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let user_id = UserId::new(id.trim());
    state.users.get(&user_id).await?;

    let orders = state.orders.list_for_user(&user_id).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}
