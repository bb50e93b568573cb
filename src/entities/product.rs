use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Catalog product entity.
///
/// `stock` is the single source of truth for availability and is only
/// decremented through the checkout reservation step. Orders snapshot
/// name/price/image at purchase time and never read back from here.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub original_price: Option<Decimal>,
    pub category: ProductCategory,
    #[sea_orm(nullable)]
    pub brand: Option<String>,
    /// JSON array of image URLs; the first entry is the primary image.
    #[sea_orm(column_type = "Json")]
    pub images: Json,
    pub stock: i32,
    #[sea_orm(column_type = "Json")]
    pub sizes: Json,
    #[sea_orm(column_type = "Json")]
    pub colors: Json,
    #[sea_orm(column_type = "Decimal(Some((3, 2)))")]
    pub rating_average: Decimal,
    pub rating_count: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// First image URL, used when freezing order item snapshots.
    pub fn primary_image(&self) -> Option<String> {
        self.images
            .as_array()
            .and_then(|imgs| imgs.first())
            .and_then(|img| img.as_str())
            .map(|s| s.to_string())
    }
}

/// Fixed product category enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum ProductCategory {
    #[sea_orm(string_value = "electronics")]
    Electronics,
    #[sea_orm(string_value = "clothing")]
    Clothing,
    #[sea_orm(string_value = "books")]
    Books,
    #[sea_orm(string_value = "home")]
    Home,
    #[sea_orm(string_value = "sports")]
    Sports,
    #[sea_orm(string_value = "beauty")]
    Beauty,
    #[sea_orm(string_value = "toys")]
    Toys,
}
