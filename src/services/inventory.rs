use crate::{
    entities::{product, CartItemModel, Product, ProductModel},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::instrument;

/// Stock reservation over the live product catalog.
///
/// Availability checking and decrementing are split so checkout can
/// fail fast before any write happens; the decrement itself is a
/// conditional update (`stock = stock - qty where stock >= qty`) so two
/// racing checkouts can never drive stock negative.
pub struct StockReservation;

impl StockReservation {
    /// Scans all lines in cart order and fails with the first product whose
    /// live stock cannot cover the requested quantity. Performs no writes.
    pub fn check_availability(lines: &[(CartItemModel, ProductModel)]) -> Result<(), ServiceError> {
        for (item, product) in lines {
            if product.stock < item.quantity {
                return Err(ServiceError::InsufficientStock(product.name.clone()));
            }
        }
        Ok(())
    }

    /// Atomically decrements one product's stock, guarded by the available
    /// quantity. Zero affected rows means the stock moved under us since the
    /// check phase; the error names the product so the client message stays
    /// identical to the check-phase failure.
    #[instrument(skip(conn))]
    pub async fn decrement<C: ConnectionTrait>(
        conn: &C,
        product_id: uuid::Uuid,
        product_name: &str,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        let result = Product::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).sub(quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::Stock.gte(quantity))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::InsufficientStock(product_name.to_string()));
        }
        Ok(())
    }
}
