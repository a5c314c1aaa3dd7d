use crate::entities::{OrderStatus, order_entity, order_item_entity};
use crate::models::{DiscountResponse, ProductResponse, UserSummary};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One submitted line item. `id` refers to an existing item of the order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderItemPayload {
    pub id: Option<i64>,
    pub product_id: Option<i64>,
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i32,
    #[schema(value_type = String, example = "39.80")]
    pub subtotal: Decimal,
    pub product: Option<ProductResponse>,
}

impl From<order_item_entity::Model> for OrderItemResponse {
    fn from(item: order_item_entity::Model) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            quantity: item.quantity,
            subtotal: item.subtotal,
            product: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: i64,
    pub user_id: i64,
    pub status: OrderStatus,
    /// Sum of item subtotals
    #[schema(value_type = String)]
    pub subtotal: Decimal,
    /// Sum of applied discounts
    #[schema(value_type = String)]
    pub discount: Decimal,
    /// `subtotal - discount`, never negative
    #[schema(value_type = String)]
    pub total: Decimal,
    pub qty_items: i64,
    pub items: Vec<OrderItemResponse>,
    pub discounts: Vec<DiscountResponse>,
    pub user: Option<UserSummary>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl OrderResponse {
    pub fn new(
        order: order_entity::Model,
        items: Vec<OrderItemResponse>,
        discounts: Vec<DiscountResponse>,
        user: Option<UserSummary>,
    ) -> Self {
        let subtotal: Decimal = items.iter().map(|i| i.subtotal).sum();
        let discount: Decimal = discounts.iter().map(|d| d.discount).sum();
        let qty_items = items.iter().map(|i| i.quantity as i64).sum();

        Self {
            id: order.id,
            user_id: order.user_id,
            status: order.status,
            subtotal,
            discount,
            total: (subtotal - discount).max(Decimal::ZERO),
            qty_items,
            items,
            discounts,
            user,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub user_id: i64,
    pub status: Option<OrderStatus>,
    pub items: Vec<OrderItemPayload>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    pub user_id: Option<i64>,
    pub status: Option<OrderStatus>,
    /// Reconciled against the current items when present
    pub items: Option<Vec<OrderItemPayload>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub items: Vec<OrderItemPayload>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateOwnOrderRequest {
    pub status: Option<OrderStatus>,
    pub items: Option<Vec<OrderItemPayload>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApplyDiscountRequest {
    #[schema(example = "SUMMER10")]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RemoveDiscountRequest {
    pub discount_id: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DiscountInfo {
    pub message: String,
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApplyDiscountResponse {
    pub order: OrderResponse,
    pub info: DiscountInfo,
}

/// Admin listing filters
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct OrderQuery {
    pub page: Option<u32>,
    #[serde(alias = "per_page")]
    pub limit: Option<u32>,
    pub status: Option<OrderStatus>,
    /// Substring of the order id
    pub id: Option<String>,
}

/// Customer listing filters
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct OwnOrderQuery {
    pub page: Option<u32>,
    #[serde(alias = "per_page")]
    pub limit: Option<u32>,
    /// Substring of the order id
    pub number: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order() -> order_entity::Model {
        order_entity::Model {
            id: 1,
            user_id: 9,
            status: OrderStatus::Pending,
            created_at: None,
            updated_at: None,
        }
    }

    fn item(id: i64, quantity: i32, subtotal: Decimal) -> OrderItemResponse {
        OrderItemResponse {
            id,
            product_id: id,
            quantity,
            subtotal,
            product: None,
        }
    }

    fn discount(amount: Decimal) -> DiscountResponse {
        DiscountResponse {
            id: 1,
            order_id: 1,
            coupon_id: 1,
            code: None,
            discount: amount,
            created_at: None,
        }
    }

    #[test]
    fn test_order_totals() {
        let resp = OrderResponse::new(
            order(),
            vec![item(1, 2, dec!(39.80)), item(2, 1, dec!(10.20))],
            vec![discount(dec!(5.00))],
            None,
        );
        assert_eq!(resp.subtotal, dec!(50.00));
        assert_eq!(resp.discount, dec!(5.00));
        assert_eq!(resp.total, dec!(45.00));
        assert_eq!(resp.qty_items, 3);
    }

    #[test]
    fn test_total_never_negative() {
        let resp = OrderResponse::new(
            order(),
            vec![item(1, 1, dec!(10.00))],
            vec![discount(dec!(8.00)), discount(dec!(8.00))],
            None,
        );
        assert_eq!(resp.total, Decimal::ZERO);
    }
}
