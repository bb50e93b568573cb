//! Integration tests for the checkout flow: cart to persisted order,
//! pricing, stock decrements and payment-intent creation.

mod common;

use axum::http::Method;
use common::{decimal, response_json, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, TransactionTrait};
use serde_json::json;
use std::sync::atomic::Ordering;
use storefront_api::{
    entities::Order, errors::ServiceError, services::inventory::StockReservation,
};

#[tokio::test]
async fn cash_checkout_prices_decrements_and_clears_cart() {
    let app = TestApp::new().await;
    let product = app.seed_product("Trail Shoe", dec!(40.00), 10).await;
    app.add_to_cart(product.id, 1).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/orders",
            Some(json!({
                "shipping_address": "1 Main St, Springfield",
                "payment_method": "cash"
            })),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;

    let order = &body["order"];
    assert_eq!(decimal(&order["subtotal"]), dec!(40.00));
    assert_eq!(decimal(&order["tax"]), dec!(3.20));
    assert_eq!(decimal(&order["shipping"]), dec!(10.00));
    assert_eq!(decimal(&order["total"]), dec!(53.20));
    assert_eq!(order["payment_method"], "cash");
    assert_eq!(order["payment_status"], "pending");
    assert_eq!(order["order_status"], "processing");
    assert!(order["payment_intent_id"].is_null());
    assert!(body["client_secret"].is_null());

    let items = order["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Trail Shoe");
    assert_eq!(decimal(&items[0]["price"]), dec!(40.00));
    assert_eq!(items[0]["quantity"], 1);

    assert_eq!(app.product_stock(product.id).await, 9);

    // Cart is emptied by checkout
    let cart = response_json(
        app.request_authenticated(Method::GET, "/api/cart", None)
            .await,
    )
    .await;
    assert!(cart["items"].as_array().unwrap().is_empty());
    assert_eq!(decimal(&cart["total_amount"]), dec!(0.00));

    // No stray gateway traffic for cash orders
    assert!(app.gateway.create_calls().is_empty());
}

#[tokio::test]
async fn shipping_is_free_above_the_threshold() {
    let app = TestApp::new().await;
    let product = app.seed_product("Canvas Tent", dec!(60.00), 5).await;
    app.add_to_cart(product.id, 2).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/orders",
            Some(json!({
                "shipping_address": "1 Main St",
                "payment_method": "cash"
            })),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;

    let order = &body["order"];
    assert_eq!(decimal(&order["subtotal"]), dec!(120.00));
    assert_eq!(decimal(&order["tax"]), dec!(9.60));
    assert_eq!(decimal(&order["shipping"]), dec!(0.00));
    assert_eq!(decimal(&order["total"]), dec!(129.60));
}

#[tokio::test]
async fn card_checkout_creates_an_intent_for_the_exact_total() {
    let app = TestApp::new().await;
    let product = app.seed_product("Trail Shoe", dec!(40.00), 10).await;
    app.add_to_cart(product.id, 1).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/orders",
            Some(json!({
                "shipping_address": "1 Main St",
                "payment_method": "card"
            })),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;

    let order = &body["order"];
    assert_eq!(order["payment_intent_id"], "pi_test_1");
    assert_eq!(body["client_secret"], "pi_test_1_secret");

    // Total 53.20 becomes 5320 in the smallest currency unit
    let calls = app.gateway.create_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].amount_cents, 5320);
    assert_eq!(calls[0].currency, "usd");
    assert_eq!(calls[0].order_id.to_string(), order["id"].as_str().unwrap());
    assert_eq!(calls[0].user_id, app.user_id);
}

#[tokio::test]
async fn empty_cart_checkout_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/orders",
            Some(json!({
                "shipping_address": "1 Main St",
                "payment_method": "cash"
            })),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Cart is empty");

    let orders = Order::find().all(&*app.state.db).await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn insufficient_stock_rejects_and_leaves_everything_untouched() {
    let app = TestApp::new().await;
    let product = app.seed_product("Trail Shoe", dec!(40.00), 2).await;
    app.add_to_cart(product.id, 3).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/orders",
            Some(json!({
                "shipping_address": "1 Main St",
                "payment_method": "cash"
            })),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Insufficient stock for Trail Shoe");

    // Stock untouched, no order written, cart keeps its line
    assert_eq!(app.product_stock(product.id).await, 2);
    let orders = Order::find().all(&*app.state.db).await.unwrap();
    assert!(orders.is_empty());

    let cart = response_json(
        app.request_authenticated(Method::GET, "/api/cart", None)
            .await,
    )
    .await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn first_shortfall_in_cart_order_is_the_one_reported() {
    let app = TestApp::new().await;
    let plenty = app.seed_product("Water Bottle", dec!(15.00), 50).await;
    let scarce = app.seed_product("Camp Stove", dec!(80.00), 1).await;
    app.add_to_cart(plenty.id, 2).await;
    app.add_to_cart(scarce.id, 2).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/orders",
            Some(json!({
                "shipping_address": "1 Main St",
                "payment_method": "cash"
            })),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Insufficient stock for Camp Stove");

    assert_eq!(app.product_stock(plenty.id).await, 50);
    assert_eq!(app.product_stock(scarce.id).await, 1);
}

#[tokio::test]
async fn guarded_decrement_names_the_product_and_rolls_back() {
    let app = TestApp::new().await;
    let product = app.seed_product("Trail Shoe", dec!(40.00), 2).await;

    let txn = app.state.db.begin().await.unwrap();
    StockReservation::decrement(&txn, product.id, &product.name, 1)
        .await
        .unwrap();

    // More than what is left: the guarded update touches zero rows
    let err = StockReservation::decrement(&txn, product.id, &product.name, 5)
        .await
        .unwrap_err();
    match err {
        ServiceError::InsufficientStock(name) => assert_eq!(name, "Trail Shoe"),
        other => panic!("unexpected error: {other:?}"),
    }
    txn.rollback().await.unwrap();

    // Rollback undoes the earlier successful decrement as well
    assert_eq!(app.product_stock(product.id).await, 2);
}

#[tokio::test]
async fn gateway_failure_persists_nothing() {
    let app = TestApp::new().await;
    let product = app.seed_product("Trail Shoe", dec!(40.00), 10).await;
    app.add_to_cart(product.id, 1).await;
    app.gateway.fail_create.store(true, Ordering::SeqCst);

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/orders",
            Some(json!({
                "shipping_address": "1 Main St",
                "payment_method": "card"
            })),
        )
        .await;
    assert_eq!(response.status(), 502);

    assert_eq!(app.product_stock(product.id).await, 10);
    let orders = Order::find().all(&*app.state.db).await.unwrap();
    assert!(orders.is_empty());

    let cart = response_json(
        app.request_authenticated(Method::GET, "/api/cart", None)
            .await,
    )
    .await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn checkout_requires_a_shipping_address() {
    let app = TestApp::new().await;
    let product = app.seed_product("Trail Shoe", dec!(40.00), 10).await;
    app.add_to_cart(product.id, 1).await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/orders",
            Some(json!({
                "shipping_address": "",
                "payment_method": "cash"
            })),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn checkout_requires_authentication() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({
                "shipping_address": "1 Main St",
                "payment_method": "cash"
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), 401);
}
