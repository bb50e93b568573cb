//! Storefront API library
//!
//! Order placement and payment reconciliation for a storefront backend:
//! carts, stock reservation, pricing and an external payment-intent
//! lifecycle, exposed over a JSON HTTP surface.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use axum::{extract::State, response::Json, routing::get, Router};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;

use services::{carts::CartService, orders::OrderService};

/// Shared application state handed to every handler.
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
}

/// Builds the full `/api` router.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .nest("/orders", handlers::orders::order_routes())
        .nest("/cart", handlers::carts::cart_routes())
}

async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    Ok(Json(json!({
        "status": db_status,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}
