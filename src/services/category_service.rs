use crate::entities::{category_entity as categories, product_entity as products};
use crate::error::{AppError, AppResult};
use crate::models::{
    CategoryQuery, CategoryResponse, CreateCategoryRequest, PaginatedResponse, PaginationParams,
    UpdateCategoryRequest, non_blank,
};
use crate::services::image_service::ensure_image_exists;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct CategoryService {
    pool: Arc<DatabaseConnection>,
}

impl CategoryService {
    pub fn new(pool: Arc<DatabaseConnection>) -> Self {
        Self { pool }
    }

    pub async fn list_categories(
        &self,
        query: &CategoryQuery,
    ) -> AppResult<PaginatedResponse<CategoryResponse>> {
        let params = PaginationParams::new(query.page, query.limit);

        let mut base = categories::Entity::find();
        if let Some(title) = non_blank(&query.title) {
            base = base.filter(categories::Column::Title.contains(title));
        }

        let total = base.clone().count(&*self.pool).await? as i64;
        let list = base
            .order_by_asc(categories::Column::Title)
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

    pub async fn get_category(&self, id: i64) -> AppResult<CategoryResponse> {
        Ok(self.find(id).await?.into())
    }

    pub async fn create_category(&self, req: CreateCategoryRequest) -> AppResult<CategoryResponse> {
        let title = validate_title(&req.title)?;
        if let Some(image_id) = req.image_id {
            ensure_image_exists(&*self.pool, image_id).await?;
        }

        let category = categories::ActiveModel {
            title: Set(title),
            description: Set(req.description),
            image_id: Set(req.image_id),
            ..Default::default()
        }
        .insert(&*self.pool)
        .await?;

        Ok(category.into())
    }

    pub async fn update_category(
        &self,
        id: i64,
        req: UpdateCategoryRequest,
    ) -> AppResult<CategoryResponse> {
        let category = self.find(id).await?;

        let mut am = category.into_active_model();
        if let Some(title) = &req.title {
            am.title = Set(validate_title(title)?);
        }
        if let Some(description) = req.description {
            am.description = Set(Some(description));
        }
        if let Some(image_id) = req.image_id {
            ensure_image_exists(&*self.pool, image_id).await?;
            am.image_id = Set(Some(image_id));
        }
        am.updated_at = Set(Some(Utc::now()));

        Ok(am.update(&*self.pool).await?.into())
    }

    /// Products of the category are kept, just uncategorized.
    pub async fn delete_category(&self, id: i64) -> AppResult<()> {
        let txn = self.pool.begin().await?;
        let category = categories::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category {id} not found")))?;

        products::Entity::update_many()
            .col_expr(products::Column::CategoryId, Expr::value(Option::<i64>::None))
            .filter(products::Column::CategoryId.eq(category.id))
            .exec(&txn)
            .await?;
        categories::Entity::delete_by_id(category.id).exec(&txn).await?;

        txn.commit().await?;
        Ok(())
    }

    async fn find(&self, id: i64) -> AppResult<categories::Model> {
        categories::Entity::find_by_id(id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category {id} not found")))
    }
}

fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > 100 {
        return Err(AppError::ValidationError(
            "Title must be between 1 and 100 characters".to_string(),
        ));
    }
    Ok(title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[test]
    fn test_validate_title() {
        assert_eq!(validate_title("  Shoes ").unwrap(), "Shoes");
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(101)).is_err());
    }

    #[tokio::test]
    async fn test_get_category() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![categories::Model {
                id: 2,
                title: "Shoes".to_string(),
                description: None,
                image_id: None,
                created_at: None,
                updated_at: None,
            }]])
            .append_query_results([Vec::<categories::Model>::new()])
            .into_connection();
        let service = CategoryService::new(Arc::new(db));

        assert_eq!(service.get_category(2).await.unwrap().title, "Shoes");
        assert!(matches!(
            service.get_category(3).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
