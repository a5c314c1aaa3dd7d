use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How the coupon magnitude is interpreted.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "coupon_discount_type"
)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `discount` percent of the discounted subtotal
    #[sea_orm(string_value = "percent")]
    Percent,
    /// fixed `discount` amount (per unit when restricted to products)
    #[sea_orm(string_value = "currency")]
    Currency,
    /// the discounted subtotal in full
    #[sea_orm(string_value = "free")]
    Free,
}

/// Which orders the coupon may discount.
/// Derived from the coupon's product and user associations.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "coupon_scope")]
#[serde(rename_all = "snake_case")]
pub enum CouponScope {
    #[sea_orm(string_value = "all")]
    All,
    #[sea_orm(string_value = "product")]
    Product,
    #[sea_orm(string_value = "client")]
    Client,
    #[sea_orm(string_value = "product_client")]
    ProductClient,
}

impl CouponScope {
    pub fn from_restrictions(has_products: bool, has_users: bool) -> Self {
        match (has_products, has_users) {
            (true, true) => CouponScope::ProductClient,
            (true, false) => CouponScope::Product,
            (false, true) => CouponScope::Client,
            (false, false) => CouponScope::All,
        }
    }

    pub fn is_product_restricted(&self) -> bool {
        matches!(self, CouponScope::Product | CouponScope::ProductClient)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Always stored uppercase
    #[sea_orm(unique)]
    pub code: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    /// Remaining uses
    pub quantity: i32,
    pub discount_type: DiscountType,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub discount: Decimal,
    pub can_use_for: CouponScope,
    /// May stack with discounts already applied to the same order
    pub recursive: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_from_restrictions() {
        assert_eq!(
            CouponScope::from_restrictions(true, true),
            CouponScope::ProductClient
        );
        assert_eq!(
            CouponScope::from_restrictions(true, false),
            CouponScope::Product
        );
        assert_eq!(
            CouponScope::from_restrictions(false, true),
            CouponScope::Client
        );
        assert_eq!(CouponScope::from_restrictions(false, false), CouponScope::All);
    }

    #[test]
    fn test_product_restricted_scopes() {
        assert!(CouponScope::Product.is_product_restricted());
        assert!(CouponScope::ProductClient.is_product_restricted());
        assert!(!CouponScope::Client.is_product_restricted());
        assert!(!CouponScope::All.is_product_restricted());
    }
}
