use crate::{
    auth::AuthenticatedUser,
    errors::ServiceError,
    handlers::common::{success_response, validate_input},
    services::carts::AddToCartInput,
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Routes for the user's shopping cart.
pub fn cart_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_cart))
        .route("/items", post(add_item))
        .route("/items/:id", delete(remove_item))
}

/// Fetches the cart, creating an empty one on first use.
async fn get_cart(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.carts.get_or_create(user.user_id).await?;
    let lines = state
        .carts
        .load_with_items(user.user_id)
        .await?
        .map(|(_, lines)| lines)
        .unwrap_or_default();

    let items: Vec<_> = lines
        .into_iter()
        .map(|(item, product)| {
            json!({
                "id": item.id,
                "product_id": item.product_id,
                "name": product.name,
                "image": product.primary_image(),
                "price": item.price,
                "quantity": item.quantity,
                "size": item.size,
                "color": item.color,
            })
        })
        .collect();

    Ok(success_response(json!({
        "id": cart.id,
        "items": items,
        "total_amount": cart.total_amount,
    })))
}

/// Adds a line to the cart, capturing the current product price.
async fn add_item(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<AddToCartInput>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let cart = state.carts.add_item(user.user_id, payload).await?;
    Ok(success_response(cart))
}

/// Removes a line from the cart.
async fn remove_item(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.carts.remove_item(user.user_id, item_id).await?;
    Ok(success_response(cart))
}
