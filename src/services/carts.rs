use crate::{
    entities::{
        cart, cart_item, order_item, Cart, CartItem, CartItemModel, CartModel, Product,
        ProductModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub size: Option<String>,
    pub color: Option<String>,
}

/// Cart service: one cart per user, created lazily on first use.
///
/// Every mutation recomputes the cached `total_amount` from the lines
/// inside the same transaction, keeping the invariant
/// total = sum(price x quantity) intact.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Fetches the user's cart, creating an empty one if none exists yet.
    #[instrument(skip(self))]
    pub async fn get_or_create(&self, user_id: Uuid) -> Result<CartModel, ServiceError> {
        if let Some(existing) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
        {
            return Ok(existing);
        }

        let now = Utc::now();
        let fresh = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            total_amount: Set(Decimal::ZERO),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let cart = fresh.insert(&*self.db).await?;
        info!(cart_id = %cart.id, %user_id, "created cart");
        Ok(cart)
    }

    /// Loads the user's cart together with its lines and their live
    /// products, in insertion order. Returns `None` when the user has no
    /// cart yet.
    pub async fn load_with_items(
        &self,
        user_id: Uuid,
    ) -> Result<Option<(CartModel, Vec<(CartItemModel, ProductModel)>)>, ServiceError> {
        let Some(cart) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
        else {
            return Ok(None);
        };

        let rows = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        let mut lines = Vec::with_capacity(rows.len());
        for (item, product) in rows {
            let product = product.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "cart line {} references missing product {}",
                    item.id, item.product_id
                ))
            })?;
            lines.push((item, product));
        }

        Ok(Some((cart, lines)))
    }

    /// Adds a line to the cart, capturing the product's current price.
    /// A line with the same product and variant is merged by quantity.
    #[instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddToCartInput,
    ) -> Result<CartModel, ServiceError> {
        let cart = self.get_or_create(user_id).await?;
        let txn = self.db.begin().await?;

        let product = Product::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        let mut same_line = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(input.product_id));
        same_line = match &input.size {
            Some(size) => same_line.filter(cart_item::Column::Size.eq(size.clone())),
            None => same_line.filter(cart_item::Column::Size.is_null()),
        };
        same_line = match &input.color {
            Some(color) => same_line.filter(cart_item::Column::Color.eq(color.clone())),
            None => same_line.filter(cart_item::Column::Color.is_null()),
        };
        let existing = same_line.one(&txn).await?;

        if let Some(item) = existing {
            let quantity = item.quantity + input.quantity;
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(quantity);
            item.update(&txn).await?;
        } else {
            let item = cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(input.product_id),
                quantity: Set(input.quantity),
                size: Set(input.size),
                color: Set(input.color),
                price: Set(product.price),
                created_at: Set(Utc::now()),
            };
            item.insert(&txn).await?;
        }

        let updated = Self::recalculate_total(&txn, cart.id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                product_id: input.product_id,
            })
            .await;

        Ok(updated)
    }

    /// Removes a line from the user's cart.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> Result<CartModel, ServiceError> {
        let cart = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart not found".to_string()))?;

        let txn = self.db.begin().await?;

        let item = CartItem::find_by_id(item_id)
            .filter(cart_item::Column::CartId.eq(cart.id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart item not found".to_string()))?;
        let product_id = item.product_id;

        CartItem::delete_by_id(item.id).exec(&txn).await?;

        let updated = Self::recalculate_total(&txn, cart.id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: cart.id,
                product_id,
            })
            .await;

        Ok(updated)
    }

    /// Re-sums the cart's lines and stores the cached total.
    async fn recalculate_total<C: ConnectionTrait>(
        conn: &C,
        cart_id: Uuid,
    ) -> Result<CartModel, ServiceError> {
        let items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .all(conn)
            .await?;

        let total: Decimal = items.iter().map(|i| i.line_total()).sum();

        let cart = Cart::find_by_id(cart_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart not found".to_string()))?;

        let mut cart: cart::ActiveModel = cart.into();
        cart.total_amount = Set(total);
        cart.updated_at = Set(Utc::now());
        Ok(cart.update(conn).await?)
    }

    /// Empties a cart after checkout: deletes all lines and zeroes the
    /// cached total. The cart row itself survives.
    pub async fn clear<C: ConnectionTrait>(conn: &C, cart: CartModel) -> Result<(), ServiceError> {
        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(conn)
            .await?;

        let cart_id = cart.id;
        let mut cart: cart::ActiveModel = cart.into();
        cart.total_amount = Set(Decimal::ZERO);
        cart.updated_at = Set(Utc::now());
        cart.update(conn).await?;

        info!(%cart_id, "cart emptied");
        Ok(())
    }
}

/// Freezes cart lines into order item snapshots.
///
/// Price comes from the cart line (captured at add time), never the live
/// product; the image is the product's primary image at checkout time.
/// Once built, these records are a permanent historical copy.
pub fn materialize_items(
    order_id: Uuid,
    lines: &[(CartItemModel, ProductModel)],
) -> Vec<order_item::ActiveModel> {
    lines
        .iter()
        .map(|(item, product)| order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            product_id: Set(product.id),
            name: Set(product.name.clone()),
            price: Set(item.price),
            quantity: Set(item.quantity),
            size: Set(item.size.clone()),
            color: Set(item.color.clone()),
            image: Set(product.primary_image()),
            created_at: Set(Utc::now()),
        })
        .collect()
}
