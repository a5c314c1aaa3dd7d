use crate::entities::{
    DiscountType, coupon_entity as coupons, coupon_product_entity as coupon_products,
    coupon_user_entity as coupon_users, discount_entity as discounts,
    product_entity as products, user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    CouponDetailResponse, CouponQuery, CouponResponse, CreateCouponRequest, DiscountResponse,
    PaginatedResponse, PaginationParams, ProductResponse, UpdateCouponRequest, UserSummary,
    non_blank, normalize_code,
};
use crate::services::discount_rules::derive_scope;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use std::sync::Arc;

/// Product ids a coupon is restricted to (empty = any product)
pub async fn coupon_product_ids<C: ConnectionTrait>(conn: &C, coupon_id: i64) -> AppResult<Vec<i64>> {
    Ok(coupon_products::Entity::find()
        .filter(coupon_products::Column::CouponId.eq(coupon_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|cp| cp.product_id)
        .collect())
}

/// User ids a coupon is restricted to (empty = any user)
pub async fn coupon_user_ids<C: ConnectionTrait>(conn: &C, coupon_id: i64) -> AppResult<Vec<i64>> {
    Ok(coupon_users::Entity::find()
        .filter(coupon_users::Column::CouponId.eq(coupon_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|cu| cu.user_id)
        .collect())
}

/// Coupon terms that must hold after every create and update.
pub fn validate_terms(
    discount_type: DiscountType,
    discount: Decimal,
    quantity: i32,
    valid_from: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
) -> AppResult<()> {
    if discount < Decimal::ZERO {
        return Err(AppError::ValidationError(
            "Discount cannot be negative".to_string(),
        ));
    }
    if discount_type == DiscountType::Percent && discount > Decimal::ONE_HUNDRED {
        return Err(AppError::ValidationError(
            "Percent discount cannot exceed 100".to_string(),
        ));
    }
    if quantity < 0 {
        return Err(AppError::ValidationError(
            "Quantity cannot be negative".to_string(),
        ));
    }
    if let Some(until) = valid_until
        && until < valid_from
    {
        return Err(AppError::ValidationError(
            "valid_until must not be earlier than valid_from".to_string(),
        ));
    }
    Ok(())
}

fn dedup(mut ids: Vec<i64>) -> Vec<i64> {
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[derive(Clone)]
pub struct CouponService {
    pool: Arc<DatabaseConnection>,
}

impl CouponService {
    pub fn new(pool: Arc<DatabaseConnection>) -> Self {
        Self { pool }
    }

    pub async fn list_coupons(
        &self,
        query: &CouponQuery,
    ) -> AppResult<PaginatedResponse<CouponResponse>> {
        let params = PaginationParams::new(query.page, query.limit);

        let mut base = coupons::Entity::find();
        if let Some(code) = non_blank(&query.code) {
            base = base.filter(coupons::Column::Code.contains(normalize_code(code).as_str()));
        }

        let total = base.clone().count(&*self.pool).await? as i64;
        let list = base
            .order_by_desc(coupons::Column::Id)
            .limit(params.limit() as u64)
            .offset(params.offset() as u64)
            .all(&*self.pool)
            .await?;

        Ok(PaginatedResponse::new(
            list.into_iter().map(Into::into).collect(),
            &params,
            total,
        ))
    }

    pub async fn get_coupon(&self, id: i64) -> AppResult<CouponDetailResponse> {
        let coupon = self.find_coupon(&*self.pool, id).await?;
        self.detail(coupon).await
    }

    pub async fn create_coupon(&self, req: CreateCouponRequest) -> AppResult<CouponDetailResponse> {
        let code = normalize_code(&req.code);
        if code.is_empty() {
            return Err(AppError::ValidationError("Coupon code is required".to_string()));
        }
        let valid_from = req.valid_from.unwrap_or_else(Utc::now);
        let quantity = req.quantity.unwrap_or(1);
        validate_terms(
            req.discount_type,
            req.discount,
            quantity,
            valid_from,
            req.valid_until,
        )?;

        let product_ids = dedup(req.products.unwrap_or_default());
        let user_ids = dedup(req.users.unwrap_or_default());

        let txn = self.pool.begin().await?;
        ensure_code_free(&txn, &code, None).await?;

        let coupon = coupons::ActiveModel {
            code: Set(code),
            valid_from: Set(valid_from),
            valid_until: Set(req.valid_until),
            quantity: Set(quantity),
            discount_type: Set(req.discount_type),
            discount: Set(req.discount),
            can_use_for: Set(derive_scope(&product_ids, &user_ids)),
            recursive: Set(req.recursive.unwrap_or(false)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        sync_products(&txn, coupon.id, &product_ids).await?;
        sync_users(&txn, coupon.id, &user_ids).await?;

        txn.commit().await?;
        log::info!("Coupon {} created", coupon.code);

        self.detail(coupon).await
    }

    /// Merges the given fields. Supplied `users`/`products` replace the
    /// stored sets and the scope is derived again from the result.
    pub async fn update_coupon(
        &self,
        id: i64,
        req: UpdateCouponRequest,
    ) -> AppResult<CouponDetailResponse> {
        let txn = self.pool.begin().await?;
        let coupon = self.find_coupon(&txn, id).await?;

        let code = match req.code.as_deref().map(normalize_code) {
            Some(code) if code.is_empty() => {
                return Err(AppError::ValidationError("Coupon code is required".to_string()));
            }
            Some(code) if code != coupon.code => {
                ensure_code_free(&txn, &code, Some(coupon.id)).await?;
                code
            }
            _ => coupon.code.clone(),
        };

        let discount_type = req.discount_type.unwrap_or(coupon.discount_type);
        let discount = req.discount.unwrap_or(coupon.discount);
        let quantity = req.quantity.unwrap_or(coupon.quantity);
        let valid_from = req.valid_from.unwrap_or(coupon.valid_from);
        let valid_until = req.valid_until.unwrap_or(coupon.valid_until);
        validate_terms(discount_type, discount, quantity, valid_from, valid_until)?;

        let product_ids = match req.products {
            Some(ids) => {
                let ids = dedup(ids);
                sync_products(&txn, coupon.id, &ids).await?;
                ids
            }
            None => coupon_product_ids(&txn, coupon.id).await?,
        };
        let user_ids = match req.users {
            Some(ids) => {
                let ids = dedup(ids);
                sync_users(&txn, coupon.id, &ids).await?;
                ids
            }
            None => coupon_user_ids(&txn, coupon.id).await?,
        };

        let recursive = req.recursive.unwrap_or(coupon.recursive);
        let mut am = coupon.into_active_model();
        am.code = Set(code);
        am.discount_type = Set(discount_type);
        am.discount = Set(discount);
        am.quantity = Set(quantity);
        am.valid_from = Set(valid_from);
        am.valid_until = Set(valid_until);
        am.recursive = Set(recursive);
        am.can_use_for = Set(derive_scope(&product_ids, &user_ids));
        am.updated_at = Set(Some(Utc::now()));
        let coupon = am.update(&txn).await?;

        txn.commit().await?;
        self.detail(coupon).await
    }

    /// Detaches products, users and applied discounts, then deletes the coupon.
    pub async fn delete_coupon(&self, id: i64) -> AppResult<()> {
        let txn = self.pool.begin().await?;
        let coupon = self.find_coupon(&txn, id).await?;

        coupon_products::Entity::delete_many()
            .filter(coupon_products::Column::CouponId.eq(coupon.id))
            .exec(&txn)
            .await?;
        coupon_users::Entity::delete_many()
            .filter(coupon_users::Column::CouponId.eq(coupon.id))
            .exec(&txn)
            .await?;
        discounts::Entity::delete_many()
            .filter(discounts::Column::CouponId.eq(coupon.id))
            .exec(&txn)
            .await?;
        coupons::Entity::delete_by_id(coupon.id).exec(&txn).await?;

        txn.commit().await?;
        log::info!("Coupon {} deleted", coupon.code);
        Ok(())
    }

    async fn find_coupon<C: ConnectionTrait>(&self, conn: &C, id: i64) -> AppResult<coupons::Model> {
        coupons::Entity::find_by_id(id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Coupon {id} not found")))
    }

    async fn detail(&self, coupon: coupons::Model) -> AppResult<CouponDetailResponse> {
        let product_ids = coupon_product_ids(&*self.pool, coupon.id).await?;
        let user_ids = coupon_user_ids(&*self.pool, coupon.id).await?;

        let products = if product_ids.is_empty() {
            Vec::new()
        } else {
            products::Entity::find()
                .filter(products::Column::Id.is_in(product_ids))
                .order_by_asc(products::Column::Id)
                .all(&*self.pool)
                .await?
                .into_iter()
                .map(ProductResponse::from)
                .collect()
        };
        let users = if user_ids.is_empty() {
            Vec::new()
        } else {
            users::Entity::find()
                .filter(users::Column::Id.is_in(user_ids))
                .order_by_asc(users::Column::Id)
                .all(&*self.pool)
                .await?
                .into_iter()
                .map(UserSummary::from)
                .collect()
        };
        let orders = discounts::Entity::find()
            .filter(discounts::Column::CouponId.eq(coupon.id))
            .order_by_desc(discounts::Column::Id)
            .all(&*self.pool)
            .await?
            .into_iter()
            .map(|d| {
                let mut resp = DiscountResponse::from(d);
                resp.code = Some(coupon.code.clone());
                resp
            })
            .collect();

        Ok(CouponDetailResponse {
            coupon: coupon.into(),
            users,
            products,
            orders,
        })
    }
}

async fn ensure_code_free<C: ConnectionTrait>(
    conn: &C,
    code: &str,
    except: Option<i64>,
) -> AppResult<()> {
    let mut query = coupons::Entity::find().filter(coupons::Column::Code.eq(code));
    if let Some(id) = except {
        query = query.filter(coupons::Column::Id.ne(id));
    }
    if query.one(conn).await?.is_some() {
        return Err(AppError::ValidationError(format!(
            "Coupon code {code} is already in use"
        )));
    }
    Ok(())
}

/// Replaces the coupon's product set with `ids` (already deduplicated).
async fn sync_products<C: ConnectionTrait>(conn: &C, coupon_id: i64, ids: &[i64]) -> AppResult<()> {
    if !ids.is_empty() {
        let found = products::Entity::find()
            .filter(products::Column::Id.is_in(ids.to_vec()))
            .all(conn)
            .await?;
        if found.len() != ids.len() {
            return Err(AppError::ValidationError(
                "One or more products do not exist".to_string(),
            ));
        }
    }

    coupon_products::Entity::delete_many()
        .filter(coupon_products::Column::CouponId.eq(coupon_id))
        .exec(conn)
        .await?;

    if !ids.is_empty() {
        coupon_products::Entity::insert_many(ids.iter().map(|&product_id| {
            coupon_products::ActiveModel {
                coupon_id: Set(coupon_id),
                product_id: Set(product_id),
                ..Default::default()
            }
        }))
        .exec(conn)
        .await?;
    }
    Ok(())
}

/// Replaces the coupon's user set with `ids` (already deduplicated).
async fn sync_users<C: ConnectionTrait>(conn: &C, coupon_id: i64, ids: &[i64]) -> AppResult<()> {
    if !ids.is_empty() {
        let found = users::Entity::find()
            .filter(users::Column::Id.is_in(ids.to_vec()))
            .all(conn)
            .await?;
        if found.len() != ids.len() {
            return Err(AppError::ValidationError(
                "One or more users do not exist".to_string(),
            ));
        }
    }

    coupon_users::Entity::delete_many()
        .filter(coupon_users::Column::CouponId.eq(coupon_id))
        .exec(conn)
        .await?;

    if !ids.is_empty() {
        coupon_users::Entity::insert_many(ids.iter().map(|&user_id| coupon_users::ActiveModel {
            coupon_id: Set(coupon_id),
            user_id: Set(user_id),
            ..Default::default()
        }))
        .exec(conn)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::CouponScope;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use crate::services::testing::statements;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[test]
    fn test_validate_terms() {
        let now = Utc::now();
        assert!(validate_terms(DiscountType::Percent, dec!(100), 1, now, None).is_ok());
        assert!(validate_terms(DiscountType::Percent, dec!(100.01), 1, now, None).is_err());
        assert!(validate_terms(DiscountType::Currency, dec!(250), 1, now, None).is_ok());
        assert!(validate_terms(DiscountType::Currency, dec!(-1), 1, now, None).is_err());
        assert!(validate_terms(DiscountType::Free, dec!(0), -1, now, None).is_err());
        assert!(
            validate_terms(
                DiscountType::Free,
                dec!(0),
                1,
                now,
                Some(now - Duration::days(1))
            )
            .is_err()
        );
    }

    #[test]
    fn test_dedup() {
        assert_eq!(dedup(vec![3, 1, 3, 2, 1]), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_get_coupon_detail() {
        let coupon = coupons::Model {
            id: 4,
            code: "VIP".to_string(),
            valid_from: Utc::now(),
            valid_until: None,
            quantity: 3,
            discount_type: DiscountType::Currency,
            discount: dec!(5),
            can_use_for: CouponScope::Client,
            recursive: false,
            created_at: None,
            updated_at: None,
        };
        let user = users::Model {
            id: 8,
            name: "Ana".to_string(),
            surname: "Lima".to_string(),
            email: "ana@example.com".to_string(),
            password_hash: "hash".to_string(),
            image_id: None,
            created_at: None,
            updated_at: None,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![coupon]])
            .append_query_results([Vec::<coupon_products::Model>::new()])
            .append_query_results([vec![coupon_users::Model {
                id: 1,
                coupon_id: 4,
                user_id: 8,
            }]])
            .append_query_results([vec![user]])
            .append_query_results([vec![discounts::Model {
                id: 2,
                order_id: 11,
                coupon_id: 4,
                discount: dec!(5.00),
                created_at: None,
                updated_at: None,
            }]])
            .into_connection();

        let detail = CouponService::new(Arc::new(db)).get_coupon(4).await.unwrap();
        assert_eq!(detail.coupon.code, "VIP");
        assert!(detail.products.is_empty());
        assert_eq!(detail.users[0].id, 8);
        assert_eq!(detail.orders[0].order_id, 11);
        assert_eq!(detail.orders[0].code.as_deref(), Some("VIP"));
    }

    #[tokio::test]
    async fn test_update_coupon_clears_valid_until() {
        let now = Utc::now();
        let coupon = coupons::Model {
            id: 6,
            code: "SPRING".to_string(),
            valid_from: now - Duration::days(2),
            valid_until: Some(now + Duration::days(5)),
            quantity: 10,
            discount_type: DiscountType::Percent,
            discount: dec!(15),
            can_use_for: CouponScope::All,
            recursive: false,
            created_at: None,
            updated_at: None,
        };
        let updated = coupons::Model {
            valid_until: None,
            ..coupon.clone()
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![coupon]])
            .append_query_results([Vec::<coupon_products::Model>::new()])
            .append_query_results([Vec::<coupon_users::Model>::new()])
            .append_query_results([vec![updated]])
            .append_query_results([Vec::<coupon_products::Model>::new()])
            .append_query_results([Vec::<coupon_users::Model>::new()])
            .append_query_results([Vec::<discounts::Model>::new()])
            .into_connection();
        let db = Arc::new(db);
        let service = CouponService::new(db.clone());

        let req = UpdateCouponRequest {
            valid_until: Some(None),
            ..Default::default()
        };
        let detail = service.update_coupon(6, req).await.unwrap();
        assert_eq!(detail.coupon.valid_until, None);
        drop(service);

        let stmts = statements(db);
        let update = stmts
            .iter()
            .find(|s| s.contains(r#"UPDATE \"coupons\""#))
            .expect("coupon update");
        assert!(update.contains("ChronoDateTimeUtc(None)"));
    }

    #[tokio::test]
    async fn test_get_coupon_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<coupons::Model>::new()])
            .into_connection();
        let err = CouponService::new(Arc::new(db)).get_coupon(1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
