use crate::entities::{CouponScope, DiscountType, coupon_entity, discount_entity};
use crate::models::{ProductResponse, UserSummary, double_option};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CouponResponse {
    pub id: i64,
    pub code: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub quantity: i32,
    pub discount_type: DiscountType,
    #[schema(value_type = String, example = "10.00")]
    pub discount: Decimal,
    pub can_use_for: CouponScope,
    pub recursive: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<coupon_entity::Model> for CouponResponse {
    fn from(coupon: coupon_entity::Model) -> Self {
        Self {
            id: coupon.id,
            code: coupon.code,
            valid_from: coupon.valid_from,
            valid_until: coupon.valid_until,
            quantity: coupon.quantity,
            discount_type: coupon.discount_type,
            discount: coupon.discount,
            can_use_for: coupon.can_use_for,
            recursive: coupon.recursive,
            created_at: coupon.created_at,
            updated_at: coupon.updated_at,
        }
    }
}

/// A coupon with everything it is attached to.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CouponDetailResponse {
    #[serde(flatten)]
    pub coupon: CouponResponse,
    pub users: Vec<UserSummary>,
    pub products: Vec<ProductResponse>,
    /// Discounts this coupon produced, one per order
    pub orders: Vec<DiscountResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateCouponRequest {
    #[schema(example = "SUMMER10")]
    pub code: String,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    #[schema(example = 100)]
    pub quantity: Option<i32>,
    pub discount_type: DiscountType,
    #[schema(value_type = String, example = "10")]
    pub discount: Decimal,
    pub recursive: Option<bool>,
    /// Restrict to these user ids
    pub users: Option<Vec<i64>>,
    /// Restrict to these product ids
    pub products: Option<Vec<i64>>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateCouponRequest {
    pub code: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    /// Omit to keep, `null` to make the coupon open-ended
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub valid_until: Option<Option<DateTime<Utc>>>,
    pub quantity: Option<i32>,
    pub discount_type: Option<DiscountType>,
    #[schema(value_type = Option<String>)]
    pub discount: Option<Decimal>,
    pub recursive: Option<bool>,
    /// Replaces the user restriction set when present
    pub users: Option<Vec<i64>>,
    /// Replaces the product restriction set when present
    pub products: Option<Vec<i64>>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct CouponQuery {
    pub page: Option<u32>,
    #[serde(alias = "per_page")]
    pub limit: Option<u32>,
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DiscountResponse {
    pub id: i64,
    pub order_id: i64,
    pub coupon_id: i64,
    /// Coupon code, when the coupon was loaded alongside
    pub code: Option<String>,
    #[schema(value_type = String, example = "20.00")]
    pub discount: Decimal,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<discount_entity::Model> for DiscountResponse {
    fn from(discount: discount_entity::Model) -> Self {
        Self {
            id: discount.id,
            order_id: discount.order_id,
            coupon_id: discount.coupon_id,
            code: None,
            discount: discount.discount,
            created_at: discount.created_at,
        }
    }
}

/// Normalized form of a coupon code, used on write and on lookup.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" summer10 "), "SUMMER10");
        assert_eq!(normalize_code("Black-Friday"), "BLACK-FRIDAY");
    }

    #[test]
    fn test_update_request_valid_until() {
        let keep: UpdateCouponRequest = serde_json::from_str(r#"{"quantity": 3}"#).unwrap();
        assert_eq!(keep.valid_until, None);

        let clear: UpdateCouponRequest =
            serde_json::from_str(r#"{"valid_until": null}"#).unwrap();
        assert_eq!(clear.valid_until, Some(None));

        let set: UpdateCouponRequest =
            serde_json::from_str(r#"{"valid_until": "2030-01-01T00:00:00Z"}"#).unwrap();
        assert!(matches!(set.valid_until, Some(Some(_))));
    }
}
