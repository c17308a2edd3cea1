//! HTTP API server with observability for order fulfillment.
//!
//! Provides REST endpoints for registration, catalog maintenance and order
//! placement, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use domain::{OrderService, ProductService, TracingObserver, UserService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Storage;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Storage> {
    pub users: UserService<S>,
    pub products: ProductService<S>,
    pub orders: OrderService<S>,
}

/// Creates the default application state over `store`.
///
/// Passwords are hashed with Argon2 and order outcomes are reported through
/// `tracing` and the global metrics recorder.
pub fn create_default_state<S: Storage>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        users: UserService::new(store.clone()),
        products: ProductService::new(store.clone()),
        orders: OrderService::new(store, Arc::new(TracingObserver)),
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Storage>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let api = Router::new()
        .route("/users/register", post(routes::users::register::<S>))
        .route("/users/{id}", get(routes::users::get::<S>))
        .route("/users/{id}/orders", get(routes::users::orders::<S>))
        .route("/products", post(routes::products::create::<S>))
        .route("/products/{id}", get(routes::products::get::<S>))
        .route(
            "/products/{id}/price",
            patch(routes::products::update_price::<S>),
        )
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .with_state(state);

    Router::new()
        .route("/health", get(routes::health::check))
        .nest("/api/v1", api)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
