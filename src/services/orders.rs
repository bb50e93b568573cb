use crate::{
    entities::{
        order::{self, OrderStatus, PaymentMethod, PaymentStatus},
        order_item, Order, OrderItem, OrderItemModel, OrderModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        carts::{materialize_items, CartService},
        inventory::StockReservation,
        payments::{IntentMetadata, PaymentGateway},
        pricing,
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, message = "Shipping address is required"))]
    pub shipping_address: String,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConfirmPaymentRequest {
    #[validate(length(min = 1, message = "Payment intent id is required"))]
    pub payment_intent_id: String,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderItemModel>,
    pub shipping_address: String,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub payment_intent_id: Option<String>,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderResponse {
    fn from_model(model: OrderModel, items: Vec<OrderItemModel>) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            items,
            shipping_address: model.shipping_address,
            payment_method: model.payment_method,
            payment_status: model.payment_status,
            order_status: model.order_status,
            subtotal: model.subtotal,
            tax: model.tax,
            shipping: model.shipping,
            total: model.total,
            payment_intent_id: model.payment_intent_id,
            tracking_number: model.tracking_number,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Checkout result: the persisted order plus, for card payments, the
/// intent's client secret the frontend needs to complete authorization.
#[derive(Debug, Serialize)]
pub struct CheckoutOutcome {
    pub order: OrderResponse,
    pub client_secret: Option<String>,
}

/// Order lifecycle manager.
///
/// Owns the checkout orchestration (cart -> order -> stock -> payment
/// intent) and the post-creation transitions: administrative status
/// updates and payment confirmation by intent id.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    carts: Arc<CartService>,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        carts: Arc<CartService>,
        gateway: Arc<dyn PaymentGateway>,
        currency: String,
    ) -> Self {
        Self {
            db,
            event_sender,
            carts,
            gateway,
            currency,
        }
    }

    /// Converts the user's cart into a persisted order.
    ///
    /// The payment intent is created before the transaction opens so no
    /// external call ever runs while locks are held. Order insert, the
    /// guarded stock decrements and the cart clear commit atomically; a
    /// decrement losing the race rolls everything back and reports the
    /// offending product, leaving stock, cart and orders untouched.
    #[instrument(skip(self, request), fields(%user_id))]
    pub async fn checkout(
        &self,
        user_id: Uuid,
        request: CheckoutRequest,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let Some((cart, lines)) = self.carts.load_with_items(user_id).await? else {
            return Err(ServiceError::EmptyCart);
        };
        if lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        StockReservation::check_availability(&lines)?;

        // The cached cart total is the checkout subtotal; lines are not
        // re-summed here.
        let subtotal = cart.total_amount;
        let breakdown = pricing::price_order(subtotal);

        let order_id = Uuid::new_v4();
        let items = materialize_items(order_id, &lines);

        let payment_intent_id = match request.payment_method {
            PaymentMethod::Card => {
                let intent = self
                    .gateway
                    .create_intent(
                        pricing::amount_in_cents(breakdown.total),
                        &self.currency,
                        IntentMetadata { order_id, user_id },
                    )
                    .await?;
                Some(intent.id)
            }
            PaymentMethod::Cash => None,
        };

        let now = Utc::now();
        let order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            shipping_address: Set(request.shipping_address),
            payment_method: Set(request.payment_method),
            payment_status: Set(PaymentStatus::Pending),
            order_status: Set(OrderStatus::Processing),
            subtotal: Set(breakdown.subtotal),
            tax: Set(breakdown.tax),
            shipping: Set(breakdown.shipping),
            total: Set(breakdown.total),
            payment_intent_id: Set(payment_intent_id.clone()),
            tracking_number: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let txn = self.db.begin().await?;

        let order = order.insert(&txn).await?;
        for item in items {
            item.insert(&txn).await?;
        }

        for (line, product) in &lines {
            StockReservation::decrement(&txn, product.id, &product.name, line.quantity).await?;
        }

        let cart_id = cart.id;
        CartService::clear(&txn, cart).await?;

        txn.commit().await?;

        self.event_sender.send_or_log(Event::OrderCreated(order_id)).await;
        for (line, product) in &lines {
            self.event_sender
                .send_or_log(Event::StockDecremented {
                    product_id: product.id,
                    quantity: line.quantity,
                })
                .await;
        }
        self.event_sender.send_or_log(Event::CartCleared(cart_id)).await;

        // Creation and retrieval are split gateway calls; the secret handed
        // back to the client comes from the retrieval.
        let client_secret = match &order.payment_intent_id {
            Some(intent_id) => self.gateway.retrieve_intent(intent_id).await?.client_secret,
            None => None,
        };

        info!(%order_id, total = %order.total, "order created");

        let items = order.find_related(OrderItem).all(&*self.db).await?;
        Ok(CheckoutOutcome {
            order: OrderResponse::from_model(order, items),
            client_secret,
        })
    }

    /// Lists the user's orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, user_id: Uuid) -> Result<Vec<OrderResponse>, ServiceError> {
        let rows = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .find_with_related(OrderItem)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(model, items)| OrderResponse::from_model(model, items))
            .collect())
    }

    /// Fetches one of the user's own orders; foreign orders 404.
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let model = Order::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let items = model.find_related(OrderItem).all(&*self.db).await?;
        Ok(OrderResponse::from_model(model, items))
    }

    /// Administrative transition on the fulfillment axis.
    #[instrument(skip(self, request), fields(%order_id, new_status = ?request.status))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        request: UpdateOrderStatusRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let model = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let old_status = model.order_status;

        let mut active: order::ActiveModel = model.into();
        active.order_status = Set(request.status);
        if let Some(tracking) = request.tracking_number {
            active.tracking_number = Set(Some(tracking));
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: format!("{:?}", old_status).to_lowercase(),
                new_status: format!("{:?}", updated.order_status).to_lowercase(),
            })
            .await;

        let items = updated.find_related(OrderItem).all(&*self.db).await?;
        Ok(OrderResponse::from_model(updated, items))
    }

    /// Flips the order carrying this intent id to paid. Idempotent: a
    /// second confirmation of the same intent is a no-op returning the
    /// already-paid order.
    #[instrument(skip(self))]
    pub async fn confirm_payment(&self, payment_intent_id: &str) -> Result<OrderResponse, ServiceError> {
        let model = Order::find()
            .filter(order::Column::PaymentIntentId.eq(payment_intent_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let model = if model.payment_status == PaymentStatus::Paid {
            model
        } else {
            let order_id = model.id;
            let mut active: order::ActiveModel = model.into();
            active.payment_status = Set(PaymentStatus::Paid);
            active.updated_at = Set(Utc::now());
            let updated = active.update(&*self.db).await?;

            self.event_sender
                .send_or_log(Event::PaymentConfirmed {
                    order_id,
                    payment_intent_id: payment_intent_id.to_string(),
                })
                .await;
            updated
        };

        let items = model.find_related(OrderItem).all(&*self.db).await?;
        Ok(OrderResponse::from_model(model, items))
    }
}
