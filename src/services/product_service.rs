use crate::entities::{
    category_entity as categories, order_item_entity as order_items, product_entity as products,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateProductRequest, PaginatedResponse, PaginationParams, ProductQuery, ProductResponse,
    UpdateProductRequest, non_blank,
};
use crate::services::image_service::ensure_image_exists;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct ProductService {
    pool: Arc<DatabaseConnection>,
}

impl ProductService {
    pub fn new(pool: Arc<DatabaseConnection>) -> Self {
        Self { pool }
    }

    pub async fn list_products(
        &self,
        query: &ProductQuery,
    ) -> AppResult<PaginatedResponse<ProductResponse>> {
        let params = PaginationParams::new(query.page, query.limit);

        let mut base = products::Entity::find();
        if let Some(name) = non_blank(&query.name) {
            base = base.filter(products::Column::Name.contains(name));
        }
        if let Some(category_id) = query.category_id {
            base = base.filter(products::Column::CategoryId.eq(category_id));
        }

        let total = base.clone().count(&*self.pool).await? as i64;
        let list = base
            .order_by_asc(products::Column::Name)
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

    pub async fn get_product(&self, id: i64) -> AppResult<ProductResponse> {
        Ok(self.find(id).await?.into())
    }

    pub async fn create_product(&self, req: CreateProductRequest) -> AppResult<ProductResponse> {
        let name = validate_name(&req.name)?;
        validate_price(req.price)?;
        self.check_references(req.image_id, req.category_id).await?;

        let product = products::ActiveModel {
            name: Set(name),
            description: Set(req.description),
            price: Set(req.price.round_dp(2)),
            image_id: Set(req.image_id),
            category_id: Set(req.category_id),
            ..Default::default()
        }
        .insert(&*self.pool)
        .await?;

        log::info!("Product {} created", product.id);
        Ok(product.into())
    }

    /// Existing order items keep the subtotal they were written with.
    pub async fn update_product(
        &self,
        id: i64,
        req: UpdateProductRequest,
    ) -> AppResult<ProductResponse> {
        let product = self.find(id).await?;
        self.check_references(req.image_id, req.category_id).await?;

        let mut am = product.into_active_model();
        if let Some(name) = &req.name {
            am.name = Set(validate_name(name)?);
        }
        if let Some(description) = req.description {
            am.description = Set(Some(description));
        }
        if let Some(price) = req.price {
            validate_price(price)?;
            am.price = Set(price.round_dp(2));
        }
        if let Some(image_id) = req.image_id {
            am.image_id = Set(Some(image_id));
        }
        if let Some(category_id) = req.category_id {
            am.category_id = Set(Some(category_id));
        }
        am.updated_at = Set(Some(Utc::now()));

        Ok(am.update(&*self.pool).await?.into())
    }

    pub async fn delete_product(&self, id: i64) -> AppResult<()> {
        let product = self.find(id).await?;

        let ordered = order_items::Entity::find()
            .filter(order_items::Column::ProductId.eq(product.id))
            .one(&*self.pool)
            .await?;
        if ordered.is_some() {
            return Err(AppError::ValidationError(format!(
                "Product {id} is part of existing orders"
            )));
        }

        products::Entity::delete_by_id(product.id)
            .exec(&*self.pool)
            .await?;
        Ok(())
    }

    async fn find(&self, id: i64) -> AppResult<products::Model> {
        products::Entity::find_by_id(id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))
    }

    async fn check_references(&self, image_id: Option<i64>, category_id: Option<i64>) -> AppResult<()> {
        if let Some(image_id) = image_id {
            ensure_image_exists(&*self.pool, image_id).await?;
        }
        if let Some(category_id) = category_id
            && categories::Entity::find_by_id(category_id)
                .one(&*self.pool)
                .await?
                .is_none()
        {
            return Err(AppError::ValidationError(format!(
                "Category {category_id} does not exist"
            )));
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 200 {
        return Err(AppError::ValidationError(
            "Name must be between 1 and 200 characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

fn validate_price(price: Decimal) -> AppResult<()> {
    if price < Decimal::ZERO {
        return Err(AppError::ValidationError(
            "Price cannot be negative".to_string(),
        ));
    }
    Ok(())
}
