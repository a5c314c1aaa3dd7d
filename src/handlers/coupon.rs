use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;
use crate::models::*;
use crate::services::CouponService;

#[utoipa::path(
    get,
    path = "/admin/coupons",
    tag = "admin",
    params(
        ("page" = Option<u32>, Query, description = "Page number, from 1"),
        ("limit" = Option<u32>, Query, description = "Page size (max 100)"),
        ("code" = Option<String>, Query, description = "Code substring, case-insensitive")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Coupon page")
    )
)]
pub async fn list_coupons(
    coupon_service: web::Data<CouponService>,
    query: web::Query<CouponQuery>,
) -> Result<HttpResponse> {
    match coupon_service.list_coupons(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/coupons",
    tag = "admin",
    request_body = CreateCouponRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Coupon created", body = CouponDetailResponse),
        (status = 400, description = "Invalid terms or duplicate code", body = ApiError)
    )
)]
pub async fn create_coupon(
    coupon_service: web::Data<CouponService>,
    request: web::Json<CreateCouponRequest>,
) -> Result<HttpResponse> {
    match coupon_service.create_coupon(request.into_inner()).await {
        Ok(coupon) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": coupon
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/coupons/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "Coupon id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Coupon with users, products and orders", body = CouponDetailResponse),
        (status = 400, description = "Coupon not found", body = ApiError)
    )
)]
pub async fn get_coupon(
    coupon_service: web::Data<CouponService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match coupon_service.get_coupon(path.into_inner()).await {
        Ok(coupon) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": coupon
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/coupons/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "Coupon id")),
    request_body = UpdateCouponRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Coupon updated", body = CouponDetailResponse),
        (status = 400, description = "Invalid terms or unknown coupon", body = ApiError)
    )
)]
pub async fn update_coupon(
    coupon_service: web::Data<CouponService>,
    path: web::Path<i64>,
    request: web::Json<UpdateCouponRequest>,
) -> Result<HttpResponse> {
    match coupon_service
        .update_coupon(path.into_inner(), request.into_inner())
        .await
    {
        Ok(coupon) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": coupon
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/coupons/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "Coupon id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Coupon and its discounts deleted"),
        (status = 400, description = "Coupon not found", body = ApiError)
    )
)]
pub async fn delete_coupon(
    coupon_service: web::Data<CouponService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match coupon_service.delete_coupon(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn coupon_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/coupons")
            .route("", web::get().to(list_coupons))
            .route("", web::post().to(create_coupon))
            .route("/{id}", web::get().to(get_coupon))
            .route("/{id}", web::put().to(update_coupon))
            .route("/{id}", web::delete().to(delete_coupon)),
    );
}
