use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;
use crate::models::*;
use crate::services::CategoryService;

#[utoipa::path(
    get,
    path = "/admin/categories",
    tag = "admin",
    params(
        ("page" = Option<u32>, Query, description = "Page number, from 1"),
        ("limit" = Option<u32>, Query, description = "Page size (max 100)"),
        ("title" = Option<String>, Query, description = "Title substring")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Category page")
    )
)]
pub async fn list_categories(
    category_service: web::Data<CategoryService>,
    query: web::Query<CategoryQuery>,
) -> Result<HttpResponse> {
    match category_service.list_categories(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/categories",
    tag = "admin",
    request_body = CreateCategoryRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 400, description = "Invalid input", body = ApiError)
    )
)]
pub async fn create_category(
    category_service: web::Data<CategoryService>,
    request: web::Json<CreateCategoryRequest>,
) -> Result<HttpResponse> {
    match category_service.create_category(request.into_inner()).await {
        Ok(category) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": category
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/categories/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "Category id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Category", body = CategoryResponse),
        (status = 400, description = "Category not found", body = ApiError)
    )
)]
pub async fn get_category(
    category_service: web::Data<CategoryService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match category_service.get_category(path.into_inner()).await {
        Ok(category) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": category
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/categories/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "Category id")),
    request_body = UpdateCategoryRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Category updated", body = CategoryResponse),
        (status = 400, description = "Invalid input or unknown category", body = ApiError)
    )
)]
pub async fn update_category(
    category_service: web::Data<CategoryService>,
    path: web::Path<i64>,
    request: web::Json<UpdateCategoryRequest>,
) -> Result<HttpResponse> {
    match category_service
        .update_category(path.into_inner(), request.into_inner())
        .await
    {
        Ok(category) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": category
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/categories/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "Category id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 400, description = "Category not found", body = ApiError)
    )
)]
pub async fn delete_category(
    category_service: web::Data<CategoryService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match category_service.delete_category(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn category_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/categories")
            .route("", web::get().to(list_categories))
            .route("", web::post().to(create_category))
            .route("/{id}", web::get().to(get_category))
            .route("/{id}", web::put().to(update_category))
            .route("/{id}", web::delete().to(delete_category)),
    );
}
