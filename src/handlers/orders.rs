use crate::{
    auth::{AdminUser, AuthenticatedUser},
    errors::ServiceError,
    handlers::common::{created_response, success_response, validate_input},
    services::orders::{CheckoutRequest, ConfirmPaymentRequest, UpdateOrderStatusRequest},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Routes for order placement and payment reconciliation.
pub fn order_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/confirm-payment", post(confirm_payment))
        .route("/:id", get(get_order))
        .route("/:id/status", put(update_order_status))
}

/// Checkout: converts the authenticated user's cart into an order.
async fn create_order(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let outcome = state.orders.checkout(user.user_id, payload).await?;
    Ok(created_response(outcome))
}

/// Lists the user's orders, newest first.
async fn list_orders(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.orders.list_orders(user.user_id).await?;
    Ok(success_response(orders))
}

/// Fetches one of the user's own orders.
async fn get_order(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.orders.get_order(user.user_id, order_id).await?;
    Ok(success_response(order))
}

/// Admin-only fulfillment transition on an order.
async fn update_order_status(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.orders.update_order_status(order_id, payload).await?;
    Ok(success_response(order))
}

/// Flips payment state for the order carrying the given intent id.
async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let order = state.orders.confirm_payment(&payload.payment_intent_id).await?;
    Ok(success_response(order))
}
