use crate::entities::{
    OrderStatus, coupon_entity as coupons, discount_entity as discounts,
    order_entity as orders, order_item_entity as items, product_entity as products,
    user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    ApplyDiscountResponse, DiscountInfo, DiscountResponse, OrderItemPayload, OrderItemResponse,
    OrderQuery, OrderResponse, OwnOrderQuery, PaginatedResponse, PaginationParams, ProductResponse,
    UserSummary, non_blank, normalize_code,
};
use crate::services::discount_rules::{
    EligibilityContext, calculate_discount, can_apply_discount, can_stack,
};
use crate::services::item_sync::OrderItemSynchronizer;
use crate::services::{coupon_product_ids, coupon_user_ids};
use chrono::Utc;
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;

pub const COUPON_APPLIED: &str = "Coupon applied successfully!";
pub const COUPON_REJECTED: &str = "Unable to apply coupon!";
pub const COUPON_ALREADY_APPLIED: &str = "Coupon is already applied to this order!";

/// Who is asking: staff see every order, customers only their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAccess {
    Any,
    Owner(i64),
}

#[derive(Clone)]
pub struct OrderService {
    pool: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(pool: Arc<DatabaseConnection>) -> Self {
        Self { pool }
    }

    /// Staff listing, optionally filtered by status and id substring
    pub async fn list_orders(
        &self,
        query: &OrderQuery,
    ) -> AppResult<PaginatedResponse<OrderResponse>> {
        let params = PaginationParams::new(query.page, query.limit);

        let mut base = orders::Entity::find();
        if let Some(status) = query.status {
            base = base.filter(orders::Column::Status.eq(status));
        }
        if let Some(needle) = non_blank(&query.id) {
            base = base.filter(id_contains(needle)?);
        }

        let total = base.clone().count(&*self.pool).await? as i64;
        let page = base
            .order_by_desc(orders::Column::Id)
            .limit(params.limit() as u64)
            .offset(params.offset() as u64)
            .all(&*self.pool)
            .await?;

        let data = load_responses(&*self.pool, page, true).await?;
        Ok(PaginatedResponse::new(data, &params, total))
    }

    /// A customer's own orders, newest first
    pub async fn list_user_orders(
        &self,
        user_id: i64,
        query: &OwnOrderQuery,
    ) -> AppResult<PaginatedResponse<OrderResponse>> {
        let params = PaginationParams::new(query.page, query.limit);

        let mut base = orders::Entity::find().filter(orders::Column::UserId.eq(user_id));
        if let Some(needle) = non_blank(&query.number) {
            base = base.filter(id_contains(needle)?);
        }

        let total = base.clone().count(&*self.pool).await? as i64;
        let page = base
            .order_by_desc(orders::Column::Id)
            .limit(params.limit() as u64)
            .offset(params.offset() as u64)
            .all(&*self.pool)
            .await?;

        let data = load_responses(&*self.pool, page, false).await?;
        Ok(PaginatedResponse::new(data, &params, total))
    }

    pub async fn create_order(
        &self,
        user_id: i64,
        status: Option<OrderStatus>,
        payloads: &[OrderItemPayload],
    ) -> AppResult<OrderResponse> {
        let txn = self.pool.begin().await?;

        ensure_user_exists(&txn, user_id).await?;

        let order = orders::ActiveModel {
            user_id: Set(user_id),
            status: Set(status.unwrap_or(OrderStatus::Pending)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        OrderItemSynchronizer::new(&txn, order.id)
            .sync_items(payloads)
            .await?;

        txn.commit().await?;
        log::info!("Order {} created for user {}", order.id, user_id);

        load_response(&*self.pool, order).await
    }

    pub async fn get_order(&self, access: OrderAccess, id: i64) -> AppResult<OrderResponse> {
        let order = find_order(&*self.pool, access, id).await?;
        load_response(&*self.pool, order).await
    }

    /// Merges owner and status; reconciles items when `payloads` is given.
    pub async fn update_order(
        &self,
        access: OrderAccess,
        id: i64,
        user_id: Option<i64>,
        status: Option<OrderStatus>,
        payloads: Option<&[OrderItemPayload]>,
    ) -> AppResult<OrderResponse> {
        let txn = self.pool.begin().await?;
        let order = find_order(&txn, access, id).await?;

        if let Some(user_id) = user_id {
            ensure_user_exists(&txn, user_id).await?;
        }

        let mut am = order.into_active_model();
        if let Some(user_id) = user_id {
            am.user_id = Set(user_id);
        }
        if let Some(status) = status {
            am.status = Set(status);
        }
        am.updated_at = Set(Some(Utc::now()));
        let order = am.update(&txn).await?;

        if let Some(payloads) = payloads {
            OrderItemSynchronizer::new(&txn, order.id)
                .update_items(payloads)
                .await?;
        }

        txn.commit().await?;
        load_response(&*self.pool, order).await
    }

    /// Deletes the order with its items and discounts, handing every applied
    /// coupon use back.
    pub async fn delete_order(&self, id: i64) -> AppResult<()> {
        let txn = self.pool.begin().await?;
        let order = find_order(&txn, OrderAccess::Any, id).await?;

        let applied = discounts::Entity::find()
            .filter(discounts::Column::OrderId.eq(order.id))
            .all(&txn)
            .await?;

        let mut uses: HashMap<i64, i32> = HashMap::new();
        for discount in &applied {
            *uses.entry(discount.coupon_id).or_default() += 1;
        }
        for (coupon_id, count) in uses {
            restore_coupon_uses(&txn, coupon_id, count).await?;
        }

        discounts::Entity::delete_many()
            .filter(discounts::Column::OrderId.eq(order.id))
            .exec(&txn)
            .await?;
        items::Entity::delete_many()
            .filter(items::Column::OrderId.eq(order.id))
            .exec(&txn)
            .await?;
        orders::Entity::delete_by_id(order.id).exec(&txn).await?;

        txn.commit().await?;
        log::info!("Order {} deleted", id);
        Ok(())
    }

    /// Attaches the coupon identified by `code` to the order.
    ///
    /// Unknown coupon or order is an error; a coupon that fails eligibility,
    /// stacking or has no uses left is reported through `info` instead.
    pub async fn apply_discount(
        &self,
        access: OrderAccess,
        id: i64,
        code: &str,
    ) -> AppResult<ApplyDiscountResponse> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(AppError::ValidationError("Coupon code is required".to_string()));
        }

        let coupon = coupons::Entity::find()
            .filter(coupons::Column::Code.eq(code.as_str()))
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Coupon {code} not found")))?;

        let txn = self.pool.begin().await?;
        let order = find_order(&txn, access, id).await?;

        let order_items = items::Entity::find()
            .filter(items::Column::OrderId.eq(order.id))
            .all(&txn)
            .await?;
        let coupon_products = coupon_product_ids(&txn, coupon.id).await?;
        let coupon_users = coupon_user_ids(&txn, coupon.id).await?;
        let existing = discounts::Entity::find()
            .filter(discounts::Column::OrderId.eq(order.id))
            .all(&txn)
            .await?;

        let already_applied = existing.iter().any(|d| d.coupon_id == coupon.id);
        let applied = if already_applied {
            log::info!("Coupon {} already applied to order {}", coupon.code, order.id);
            true
        } else {
            let order_products: Vec<i64> = order_items.iter().map(|i| i.product_id).collect();
            let ctx = EligibilityContext {
                order_owner: order.user_id,
                order_products: &order_products,
                coupon: &coupon,
                coupon_products: &coupon_products,
                coupon_users: &coupon_users,
            };

            if !can_apply_discount(&ctx, Utc::now()) {
                log::warn!("Coupon {} is not eligible for order {}", coupon.code, order.id);
                false
            } else if !can_stack(existing.len() as u64, &coupon) {
                log::warn!(
                    "Coupon {} cannot stack on order {} ({} discounts applied)",
                    coupon.code,
                    order.id,
                    existing.len()
                );
                false
            } else if !take_coupon_use(&txn, coupon.id).await? {
                log::warn!("Coupon {} has no uses left", coupon.code);
                false
            } else {
                let amount = calculate_discount(&coupon, &coupon_products, &order_items);
                discounts::ActiveModel {
                    order_id: Set(order.id),
                    coupon_id: Set(coupon.id),
                    discount: Set(amount),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
                log::info!(
                    "Coupon {} applied to order {}: -{}",
                    coupon.code,
                    order.id,
                    amount
                );
                true
            }
        };

        txn.commit().await?;

        let message = match (applied, already_applied) {
            (true, true) => COUPON_ALREADY_APPLIED,
            (true, false) => COUPON_APPLIED,
            (false, _) => COUPON_REJECTED,
        };
        Ok(ApplyDiscountResponse {
            order: load_response(&*self.pool, order).await?,
            info: DiscountInfo {
                message: message.to_string(),
                success: applied,
            },
        })
    }

    /// Detaches one discount from the order and gives its coupon use back.
    pub async fn remove_discount(
        &self,
        access: OrderAccess,
        id: i64,
        discount_id: i64,
    ) -> AppResult<OrderResponse> {
        let txn = self.pool.begin().await?;
        let order = find_order(&txn, access, id).await?;

        let discount = discounts::Entity::find_by_id(discount_id)
            .filter(discounts::Column::OrderId.eq(order.id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Discount {discount_id} not found on order {id}"))
            })?;

        discounts::Entity::delete_by_id(discount.id).exec(&txn).await?;
        restore_coupon_uses(&txn, discount.coupon_id, 1).await?;

        txn.commit().await?;
        log::info!("Discount {} removed from order {}", discount.id, order.id);

        load_response(&*self.pool, order).await
    }
}

async fn find_order<C: ConnectionTrait>(
    conn: &C,
    access: OrderAccess,
    id: i64,
) -> AppResult<orders::Model> {
    let mut query = orders::Entity::find_by_id(id);
    if let OrderAccess::Owner(user_id) = access {
        query = query.filter(orders::Column::UserId.eq(user_id));
    }
    query
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))
}

async fn ensure_user_exists<C: ConnectionTrait>(conn: &C, user_id: i64) -> AppResult<()> {
    users::Entity::find_by_id(user_id)
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::ValidationError(format!("User {user_id} does not exist")))
}

/// Guarded decrement; `false` when the coupon has no uses left.
async fn take_coupon_use<C: ConnectionTrait>(conn: &C, coupon_id: i64) -> AppResult<bool> {
    let result = coupons::Entity::update_many()
        .col_expr(
            coupons::Column::Quantity,
            Expr::col(coupons::Column::Quantity).sub(1),
        )
        .filter(coupons::Column::Id.eq(coupon_id))
        .filter(coupons::Column::Quantity.gt(0))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

async fn restore_coupon_uses<C: ConnectionTrait>(
    conn: &C,
    coupon_id: i64,
    count: i32,
) -> AppResult<()> {
    coupons::Entity::update_many()
        .col_expr(
            coupons::Column::Quantity,
            Expr::col(coupons::Column::Quantity).add(count),
        )
        .filter(coupons::Column::Id.eq(coupon_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// `CAST(id AS TEXT) LIKE '%needle%'`; only digits can ever match an id.
fn id_contains(needle: &str) -> AppResult<SimpleExpr> {
    if !needle.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::ValidationError(
            "Order number must contain digits only".to_string(),
        ));
    }
    Ok(Expr::cust(format!(
        "CAST(\"orders\".\"id\" AS TEXT) LIKE '%{needle}%'"
    )))
}

async fn load_response<C: ConnectionTrait>(
    conn: &C,
    order: orders::Model,
) -> AppResult<OrderResponse> {
    let mut responses = load_responses(conn, vec![order], true).await?;
    responses
        .pop()
        .ok_or_else(|| AppError::InternalError("Order response was not built".to_string()))
}

/// Builds responses for a page of orders with one query per related table.
async fn load_responses<C: ConnectionTrait>(
    conn: &C,
    page: Vec<orders::Model>,
    with_user: bool,
) -> AppResult<Vec<OrderResponse>> {
    if page.is_empty() {
        return Ok(Vec::new());
    }
    let order_ids: Vec<i64> = page.iter().map(|o| o.id).collect();

    let all_items = items::Entity::find()
        .filter(items::Column::OrderId.is_in(order_ids.clone()))
        .order_by_asc(items::Column::Id)
        .all(conn)
        .await?;

    let mut product_ids: Vec<i64> = all_items.iter().map(|i| i.product_id).collect();
    product_ids.sort_unstable();
    product_ids.dedup();
    let product_map: HashMap<i64, products::Model> = if product_ids.is_empty() {
        HashMap::new()
    } else {
        products::Entity::find()
            .filter(products::Column::Id.is_in(product_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect()
    };

    let all_discounts = discounts::Entity::find()
        .filter(discounts::Column::OrderId.is_in(order_ids))
        .order_by_asc(discounts::Column::Id)
        .all(conn)
        .await?;

    let mut coupon_ids: Vec<i64> = all_discounts.iter().map(|d| d.coupon_id).collect();
    coupon_ids.sort_unstable();
    coupon_ids.dedup();
    let code_map: HashMap<i64, String> = if coupon_ids.is_empty() {
        HashMap::new()
    } else {
        coupons::Entity::find()
            .filter(coupons::Column::Id.is_in(coupon_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|c| (c.id, c.code))
            .collect()
    };

    let user_map: HashMap<i64, users::Model> = if with_user {
        let mut user_ids: Vec<i64> = page.iter().map(|o| o.user_id).collect();
        user_ids.sort_unstable();
        user_ids.dedup();
        users::Entity::find()
            .filter(users::Column::Id.is_in(user_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect()
    } else {
        HashMap::new()
    };

    let mut items_by_order: HashMap<i64, Vec<OrderItemResponse>> = HashMap::new();
    for item in all_items {
        let order_id = item.order_id;
        let product = product_map.get(&item.product_id).cloned().map(ProductResponse::from);
        let mut resp = OrderItemResponse::from(item);
        resp.product = product;
        items_by_order.entry(order_id).or_default().push(resp);
    }

    let mut discounts_by_order: HashMap<i64, Vec<DiscountResponse>> = HashMap::new();
    for discount in all_discounts {
        let order_id = discount.order_id;
        let code = code_map.get(&discount.coupon_id).cloned();
        let mut resp = DiscountResponse::from(discount);
        resp.code = code;
        discounts_by_order.entry(order_id).or_default().push(resp);
    }

    Ok(page
        .into_iter()
        .map(|order| {
            let items = items_by_order.remove(&order.id).unwrap_or_default();
            let discounts = discounts_by_order.remove(&order.id).unwrap_or_default();
            let user = user_map.get(&order.user_id).cloned().map(UserSummary::from);
            OrderResponse::new(order, items, discounts, user)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        CouponScope, DiscountType, coupon_product_entity, coupon_user_entity,
    };
    use crate::services::testing::statements;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn order(id: i64, user_id: i64) -> orders::Model {
        orders::Model {
            id,
            user_id,
            status: OrderStatus::Pending,
            created_at: None,
            updated_at: None,
        }
    }

    fn user(id: i64) -> users::Model {
        users::Model {
            id,
            name: "Jane".to_string(),
            surname: "Doe".to_string(),
            email: "jane@example.com".to_string(),
            password_hash: "hash".to_string(),
            image_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn product(id: i64, price: Decimal) -> products::Model {
        products::Model {
            id,
            name: format!("Product {id}"),
            description: None,
            price,
            image_id: None,
            category_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn item(id: i64, order_id: i64, product_id: i64, quantity: i32, subtotal: Decimal) -> items::Model {
        items::Model {
            id,
            order_id,
            product_id,
            quantity,
            subtotal,
            created_at: None,
            updated_at: None,
        }
    }

    fn coupon(id: i64, scope: CouponScope, recursive: bool) -> coupons::Model {
        coupons::Model {
            id,
            code: "SUMMER10".to_string(),
            valid_from: Utc::now() - Duration::days(1),
            valid_until: None,
            quantity: 5,
            discount_type: DiscountType::Percent,
            discount: dec!(10),
            can_use_for: scope,
            recursive,
            created_at: None,
            updated_at: None,
        }
    }

    fn discount(id: i64, order_id: i64, coupon_id: i64, amount: Decimal) -> discounts::Model {
        discounts::Model {
            id,
            order_id,
            coupon_id,
            discount: amount,
            created_at: None,
            updated_at: None,
        }
    }

    fn exec(rows: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: rows,
        }
    }

    fn position(stmts: &[String], pred: impl Fn(&str) -> bool) -> usize {
        stmts
            .iter()
            .position(|s| pred(s))
            .expect("statement not issued")
    }

    fn is_coupon_update(stmt: &str, op: &str) -> bool {
        stmt.contains(r#"UPDATE \"coupons\""#)
            && stmt.contains(&format!(r#"\"quantity\" {op} $1"#))
    }

    fn is_sql(stmt: &str, prefix: &str) -> bool {
        stmt.trim_start().starts_with(&format!("sql: \"{prefix}"))
    }

    #[tokio::test]
    async fn test_get_order_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<orders::Model>::new()])
            .into_connection();

        let err = OrderService::new(Arc::new(db))
            .get_order(OrderAccess::Owner(3), 99)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_order_builds_totals() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order(1, 7)]])
            .append_query_results([vec![item(10, 1, 3, 2, dec!(40.00))]])
            .append_query_results([vec![product(3, dec!(20.00))]])
            .append_query_results([vec![discount(5, 1, 2, dec!(4.00))]])
            .append_query_results([vec![coupon(2, CouponScope::All, false)]])
            .append_query_results([vec![user(7)]])
            .into_connection();

        let resp = OrderService::new(Arc::new(db))
            .get_order(OrderAccess::Any, 1)
            .await
            .unwrap();

        assert_eq!(resp.subtotal, dec!(40.00));
        assert_eq!(resp.discount, dec!(4.00));
        assert_eq!(resp.total, dec!(36.00));
        assert_eq!(resp.qty_items, 2);
        assert_eq!(resp.discounts[0].code.as_deref(), Some("SUMMER10"));
        assert_eq!(resp.items[0].product.as_ref().map(|p| p.id), Some(3));
        assert_eq!(resp.user.as_ref().map(|u| u.id), Some(7));
    }

    #[tokio::test]
    async fn test_apply_discount_unknown_coupon() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<coupons::Model>::new()])
            .into_connection();

        let err = OrderService::new(Arc::new(db))
            .apply_discount(OrderAccess::Any, 1, "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_apply_discount_success() {
        let c = coupon(2, CouponScope::All, false);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![c.clone()]])
            .append_query_results([vec![order(1, 7)]])
            .append_query_results([vec![item(10, 1, 3, 2, dec!(200.00))]])
            .append_query_results([Vec::<coupon_product_entity::Model>::new()])
            .append_query_results([Vec::<coupon_user_entity::Model>::new()])
            .append_query_results([Vec::<discounts::Model>::new()])
            .append_exec_results([exec(1)])
            .append_query_results([vec![discount(5, 1, 2, dec!(20.00))]])
            // response
            .append_query_results([vec![item(10, 1, 3, 2, dec!(200.00))]])
            .append_query_results([vec![product(3, dec!(100.00))]])
            .append_query_results([vec![discount(5, 1, 2, dec!(20.00))]])
            .append_query_results([vec![c]])
            .append_query_results([vec![user(7)]])
            .into_connection();
        let db = Arc::new(db);

        let resp = OrderService::new(db.clone())
            .apply_discount(OrderAccess::Any, 1, " summer10 ")
            .await
            .unwrap();

        assert!(resp.info.success);
        assert_eq!(resp.info.message, COUPON_APPLIED);
        assert_eq!(resp.order.discount, dec!(20.00));
        assert_eq!(resp.order.total, dec!(180.00));

        let stmts = statements(db);
        let take = position(&stmts, |sql| is_coupon_update(sql, "-"));
        assert!(stmts[take].contains(r#"\"quantity\" > $"#));
        let insert = position(&stmts, |s| s.contains(r#"INSERT INTO \"discounts\""#));
        let commit = position(&stmts, |s| is_sql(s, "COMMIT"));
        assert!(take < insert && insert < commit);
    }

    #[tokio::test]
    async fn test_apply_discount_already_on_order() {
        let c = coupon(2, CouponScope::All, false);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![c.clone()]])
            .append_query_results([vec![order(1, 7)]])
            .append_query_results([vec![item(10, 1, 3, 1, dec!(50.00))]])
            .append_query_results([Vec::<coupon_product_entity::Model>::new()])
            .append_query_results([Vec::<coupon_user_entity::Model>::new()])
            .append_query_results([vec![discount(5, 1, 2, dec!(5.00))]])
            // response
            .append_query_results([vec![item(10, 1, 3, 1, dec!(50.00))]])
            .append_query_results([vec![product(3, dec!(50.00))]])
            .append_query_results([vec![discount(5, 1, 2, dec!(5.00))]])
            .append_query_results([vec![c]])
            .append_query_results([vec![user(7)]])
            .into_connection();
        let db = Arc::new(db);

        let resp = OrderService::new(db.clone())
            .apply_discount(OrderAccess::Owner(7), 1, "SUMMER10")
            .await
            .unwrap();

        assert!(resp.info.success);
        assert_eq!(resp.info.message, COUPON_ALREADY_APPLIED);
        assert_eq!(resp.order.discounts.len(), 1);

        let stmts = statements(db);
        assert!(!stmts.iter().any(|s| is_sql(s, "UPDATE") || is_sql(s, "INSERT")));
    }

    #[tokio::test]
    async fn test_apply_discount_refuses_non_recursive_stack() {
        let c = coupon(2, CouponScope::All, false);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![c.clone()]])
            .append_query_results([vec![order(1, 7)]])
            .append_query_results([vec![item(10, 1, 3, 1, dec!(50.00))]])
            .append_query_results([Vec::<coupon_product_entity::Model>::new()])
            .append_query_results([Vec::<coupon_user_entity::Model>::new()])
            .append_query_results([vec![discount(4, 1, 9, dec!(5.00))]])
            // response
            .append_query_results([vec![item(10, 1, 3, 1, dec!(50.00))]])
            .append_query_results([vec![product(3, dec!(50.00))]])
            .append_query_results([vec![discount(4, 1, 9, dec!(5.00))]])
            .append_query_results([vec![coupon(9, CouponScope::All, true)]])
            .append_query_results([vec![user(7)]])
            .into_connection();

        let resp = OrderService::new(Arc::new(db))
            .apply_discount(OrderAccess::Owner(7), 1, "SUMMER10")
            .await
            .unwrap();

        assert!(!resp.info.success);
        assert_eq!(resp.info.message, COUPON_REJECTED);
        assert_eq!(resp.order.discounts.len(), 1);
    }

    #[tokio::test]
    async fn test_apply_discount_exhausted_coupon() {
        let c = coupon(2, CouponScope::All, true);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![c]])
            .append_query_results([vec![order(1, 7)]])
            .append_query_results([Vec::<items::Model>::new()])
            .append_query_results([Vec::<coupon_product_entity::Model>::new()])
            .append_query_results([Vec::<coupon_user_entity::Model>::new()])
            .append_query_results([Vec::<discounts::Model>::new()])
            .append_exec_results([exec(0)])
            // response
            .append_query_results([Vec::<items::Model>::new()])
            .append_query_results([Vec::<discounts::Model>::new()])
            .append_query_results([vec![user(7)]])
            .into_connection();

        let resp = OrderService::new(Arc::new(db))
            .apply_discount(OrderAccess::Any, 1, "SUMMER10")
            .await
            .unwrap();

        assert!(!resp.info.success);
        assert!(resp.order.discounts.is_empty());
    }

    #[tokio::test]
    async fn test_remove_discount() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order(1, 7)]])
            .append_query_results([vec![discount(5, 1, 2, dec!(20.00))]])
            .append_exec_results([exec(1), exec(1)])
            // response
            .append_query_results([Vec::<items::Model>::new()])
            .append_query_results([Vec::<discounts::Model>::new()])
            .append_query_results([vec![user(7)]])
            .into_connection();
        let db = Arc::new(db);

        let resp = OrderService::new(db.clone())
            .remove_discount(OrderAccess::Owner(7), 1, 5)
            .await
            .unwrap();

        assert!(resp.discounts.is_empty());
        assert_eq!(resp.discount, Decimal::ZERO);

        let stmts = statements(db);
        let delete = position(&stmts, |s| s.contains(r#"DELETE FROM \"discounts\""#));
        let restore = position(&stmts, |s| is_coupon_update(s, "+"));
        let commit = position(&stmts, |s| is_sql(s, "COMMIT"));
        assert!(delete < restore && restore < commit);
        assert!(stmts[restore].contains("Values([Int(Some(1)), BigInt(Some(2))])"));
    }

    #[tokio::test]
    async fn test_delete_order_restores_each_coupon() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order(1, 7)]])
            .append_query_results([vec![
                discount(5, 1, 2, dec!(5.00)),
                discount(6, 1, 3, dec!(2.00)),
            ]])
            .append_exec_results([exec(1), exec(1), exec(2), exec(3), exec(1)])
            .into_connection();
        let db = Arc::new(db);

        let service = OrderService::new(db.clone());
        // the copy registered with each worker shares the same connection
        service.clone().delete_order(1).await.unwrap();
        drop(service);

        let stmts = statements(db);
        let restores: Vec<&String> = stmts
            .iter()
            .filter(|s| is_coupon_update(s, "+"))
            .collect();
        assert_eq!(restores.len(), 2);
        assert!(restores
            .iter()
            .any(|s| s.contains("Values([Int(Some(1)), BigInt(Some(2))])")));
        assert!(restores
            .iter()
            .any(|s| s.contains("Values([Int(Some(1)), BigInt(Some(3))])")));
        let last_restore = stmts
            .iter()
            .rposition(|s| is_coupon_update(s, "+"))
            .unwrap();
        let delete_order = position(&stmts, |s| s.contains(r#"DELETE FROM \"orders\""#));
        assert!(last_restore < delete_order);
        assert!(stmts.last().is_some_and(|s| is_sql(s, "COMMIT")));
    }

    #[tokio::test]
    async fn test_remove_discount_from_other_order() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order(1, 7)]])
            .append_query_results([Vec::<discounts::Model>::new()])
            .into_connection();

        let err = OrderService::new(Arc::new(db))
            .remove_discount(OrderAccess::Any, 1, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_id_filter_accepts_digits_only() {
        assert!(id_contains("12").is_ok());
        assert!(id_contains("1; DROP TABLE orders").is_err());
    }
}
