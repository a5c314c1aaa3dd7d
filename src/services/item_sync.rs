use crate::entities::{order_item_entity as items, product_entity as products};
use crate::error::{AppError, AppResult};
use crate::models::OrderItemPayload;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use std::collections::{HashMap, HashSet};

/// Changes for one existing item. `None` keeps the stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUpdate {
    pub id: i64,
    pub product_id: Option<i64>,
    pub quantity: Option<i32>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ItemSyncPlan {
    pub delete_ids: Vec<i64>,
    pub updates: Vec<ItemUpdate>,
    pub creates: Vec<OrderItemPayload>,
}

/// Reconciles the ids currently on an order with a submitted item list.
///
/// Existing items missing from `incoming` are deleted, items whose id matches
/// are updated and items without an id are created. Ids that do not belong
/// to the order are dropped.
pub fn plan_item_update(existing_ids: &[i64], incoming: &[OrderItemPayload]) -> ItemSyncPlan {
    let existing: HashSet<i64> = existing_ids.iter().copied().collect();
    let mut kept = HashSet::new();
    let mut plan = ItemSyncPlan::default();

    for payload in incoming {
        match payload.id {
            Some(id) if existing.contains(&id) => {
                kept.insert(id);
                plan.updates.push(ItemUpdate {
                    id,
                    product_id: payload.product_id,
                    quantity: payload.quantity,
                });
            }
            Some(id) => log::warn!("Ignoring item {id}: not part of this order"),
            None => plan.creates.push(payload.clone()),
        }
    }

    plan.delete_ids = existing_ids
        .iter()
        .copied()
        .filter(|id| !kept.contains(id))
        .collect();
    plan
}

fn validate_quantity(quantity: i32) -> AppResult<i32> {
    if quantity < 1 {
        return Err(AppError::ValidationError(
            "Item quantity must be at least 1".to_string(),
        ));
    }
    Ok(quantity)
}

/// Writes an order's line items. Meant to run on an open transaction so that
/// any validation failure rolls back the whole order write.
pub struct OrderItemSynchronizer<'a, C: ConnectionTrait> {
    conn: &'a C,
    order_id: i64,
}

impl<'a, C: ConnectionTrait> OrderItemSynchronizer<'a, C> {
    pub fn new(conn: &'a C, order_id: i64) -> Self {
        Self { conn, order_id }
    }

    /// Replaces every item of the order with `payloads`.
    pub async fn sync_items(&self, payloads: &[OrderItemPayload]) -> AppResult<Vec<items::Model>> {
        items::Entity::delete_many()
            .filter(items::Column::OrderId.eq(self.order_id))
            .exec(self.conn)
            .await?;

        let prices = self
            .load_prices(payloads.iter().filter_map(|p| p.product_id))
            .await?;

        let mut created = Vec::with_capacity(payloads.len());
        for payload in payloads {
            created.push(self.create_item(payload, &prices).await?);
        }
        Ok(created)
    }

    /// Applies [`plan_item_update`] to the order's current items.
    pub async fn update_items(
        &self,
        payloads: &[OrderItemPayload],
    ) -> AppResult<Vec<items::Model>> {
        let existing = self.current_items().await?;
        let existing_ids: Vec<i64> = existing.iter().map(|i| i.id).collect();
        let plan = plan_item_update(&existing_ids, payloads);

        if !plan.delete_ids.is_empty() {
            items::Entity::delete_many()
                .filter(items::Column::OrderId.eq(self.order_id))
                .filter(items::Column::Id.is_in(plan.delete_ids.clone()))
                .exec(self.conn)
                .await?;
        }

        let by_id: HashMap<i64, &items::Model> = existing.iter().map(|i| (i.id, i)).collect();
        let wanted_products = plan
            .updates
            .iter()
            .filter_map(|u| {
                u.product_id
                    .or_else(|| by_id.get(&u.id).map(|i| i.product_id))
            })
            .chain(plan.creates.iter().filter_map(|c| c.product_id));
        let prices = self.load_prices(wanted_products).await?;

        for update in &plan.updates {
            let Some(current) = by_id.get(&update.id) else {
                continue;
            };
            let product_id = update.product_id.unwrap_or(current.product_id);
            let quantity = validate_quantity(update.quantity.unwrap_or(current.quantity))?;
            let price = price_of(&prices, product_id)?;

            let mut am = (*current).clone().into_active_model();
            am.product_id = Set(product_id);
            am.quantity = Set(quantity);
            am.subtotal = Set(price * Decimal::from(quantity));
            am.updated_at = Set(Some(Utc::now()));
            am.update(self.conn).await?;
        }

        for payload in &plan.creates {
            self.create_item(payload, &prices).await?;
        }

        self.current_items().await
    }

    async fn current_items(&self) -> AppResult<Vec<items::Model>> {
        Ok(items::Entity::find()
            .filter(items::Column::OrderId.eq(self.order_id))
            .order_by_asc(items::Column::Id)
            .all(self.conn)
            .await?)
    }

    async fn create_item(
        &self,
        payload: &OrderItemPayload,
        prices: &HashMap<i64, Decimal>,
    ) -> AppResult<items::Model> {
        let product_id = payload
            .product_id
            .ok_or_else(|| AppError::ValidationError("Item product_id is required".to_string()))?;
        let quantity = validate_quantity(payload.quantity.unwrap_or(1))?;
        let price = price_of(prices, product_id)?;

        let item = items::ActiveModel {
            order_id: Set(self.order_id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            subtotal: Set(price * Decimal::from(quantity)),
            ..Default::default()
        }
        .insert(self.conn)
        .await?;
        Ok(item)
    }

    async fn load_prices(
        &self,
        product_ids: impl Iterator<Item = i64>,
    ) -> AppResult<HashMap<i64, Decimal>> {
        let ids: HashSet<i64> = product_ids.collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let found = products::Entity::find()
            .filter(products::Column::Id.is_in(ids))
            .all(self.conn)
            .await?;
        Ok(found.into_iter().map(|p| (p.id, p.price)).collect())
    }
}

fn price_of(prices: &HashMap<i64, Decimal>, product_id: i64) -> AppResult<Decimal> {
    prices
        .get(&product_id)
        .copied()
        .ok_or_else(|| AppError::ValidationError(format!("Product {product_id} does not exist")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn payload(id: Option<i64>, product_id: Option<i64>, quantity: Option<i32>) -> OrderItemPayload {
        OrderItemPayload {
            id,
            product_id,
            quantity,
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

    fn item(id: i64, product_id: i64, quantity: i32, subtotal: Decimal) -> items::Model {
        items::Model {
            id,
            order_id: 1,
            product_id,
            quantity,
            subtotal,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_plan_deletes_missing_and_updates_matching() {
        let plan = plan_item_update(&[1, 2], &[payload(Some(1), None, Some(3))]);
        assert_eq!(plan.delete_ids, vec![2]);
        assert_eq!(
            plan.updates,
            vec![ItemUpdate {
                id: 1,
                product_id: None,
                quantity: Some(3)
            }]
        );
        assert!(plan.creates.is_empty());
    }

    #[test]
    fn test_plan_creates_items_without_id() {
        let plan = plan_item_update(&[1], &[payload(None, Some(5), Some(2))]);
        assert_eq!(plan.delete_ids, vec![1]);
        assert!(plan.updates.is_empty());
        assert_eq!(plan.creates, vec![payload(None, Some(5), Some(2))]);
    }

    #[test]
    fn test_plan_compares_whole_plans() {
        let incoming = [payload(Some(1), None, Some(4)), payload(None, Some(8), Some(1))];
        let expected = ItemSyncPlan {
            delete_ids: vec![2, 3],
            updates: vec![ItemUpdate {
                id: 1,
                product_id: None,
                quantity: Some(4),
            }],
            creates: vec![payload(None, Some(8), Some(1))],
        };
        assert_eq!(plan_item_update(&[1, 2, 3], &incoming), expected);
    }

    #[test]
    fn test_plan_ignores_foreign_ids() {
        let plan = plan_item_update(&[1], &[payload(Some(99), Some(5), Some(2))]);
        assert_eq!(plan.delete_ids, vec![1]);
        assert!(plan.updates.is_empty());
        assert!(plan.creates.is_empty());
    }

    #[test]
    fn test_plan_empty_list_clears_order() {
        let plan = plan_item_update(&[1, 2, 3], &[]);
        assert_eq!(plan.delete_ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_sync_items_prices_each_line() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .append_query_results([vec![product(7, dec!(19.90))]])
            .append_query_results([vec![item(10, 7, 2, dec!(39.80))]])
            .into_connection();

        let created = OrderItemSynchronizer::new(&db, 1)
            .sync_items(&[payload(None, Some(7), Some(2))])
            .await
            .unwrap();

        assert_eq!(created.len(), 1);
        assert_eq!(created[0].subtotal, dec!(39.80));
    }

    #[tokio::test]
    async fn test_sync_items_rejects_unknown_product() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .append_query_results([Vec::<products::Model>::new()])
            .into_connection();

        let err = OrderItemSynchronizer::new(&db, 1)
            .sync_items(&[payload(None, Some(404), Some(1))])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_sync_items_rejects_zero_quantity() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .append_query_results([vec![product(7, dec!(1.00))]])
            .into_connection();

        let err = OrderItemSynchronizer::new(&db, 1)
            .sync_items(&[payload(None, Some(7), Some(0))])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
