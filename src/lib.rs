pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod external;
pub mod handlers;
pub mod services;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{config::AppConfig, events::EventSender, handlers::AppServices};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub services: AppServices,
    pub event_sender: Arc<EventSender>,
}

async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

/// Builds the full application router.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/carts", handlers::carts::router())
        .nest("/checkout", handlers::checkout::router())
        .nest("/orders", handlers::orders::router())
        .nest("/coupons", handlers::coupons::router())
        .nest("/products", handlers::products::router())
        .nest("/payments", handlers::payments::router())
        .route(
            "/shops/:shop_id/orders",
            get(handlers::orders::list_shop_orders),
        )
        .route(
            "/shops/:shop_id/products",
            get(handlers::products::list_shop_products),
        )
        .route(
            "/categories",
            get(handlers::products::list_categories).post(handlers::products::create_category),
        )
        .route(
            "/discounts/:discount_id",
            axum::routing::put(handlers::products::update_discount),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}
