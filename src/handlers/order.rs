use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;
use crate::entities::OrderStatus;
use crate::events::{Notification, Notifier};
use crate::middlewares::current_user;
use crate::models::*;
use crate::services::{OrderAccess, OrderService};

// Customer endpoints: every call is scoped to the caller's own orders.
// Customers cannot delete an order; DELETE on an order detaches a discount.

#[utoipa::path(
    get,
    path = "/orders",
    tag = "orders",
    params(
        ("page" = Option<u32>, Query, description = "Page number, from 1"),
        ("limit" = Option<u32>, Query, description = "Page size (max 100)"),
        ("number" = Option<String>, Query, description = "Order number substring")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's orders, newest first"),
        (status = 401, description = "Not authenticated", body = ApiError)
    )
)]
pub async fn list_my_orders(
    req: HttpRequest,
    order_service: web::Data<OrderService>,
    query: web::Query<OwnOrderQuery>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match order_service.list_user_orders(user.id, &query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/orders",
    tag = "orders",
    request_body = CheckoutRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Order placed", body = OrderResponse),
        (status = 400, description = "Invalid items", body = ApiError)
    )
)]
pub async fn checkout(
    req: HttpRequest,
    order_service: web::Data<OrderService>,
    notifier: web::Data<Notifier>,
    request: web::Json<CheckoutRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match order_service
        .create_order(user.id, None, &request.items)
        .await
    {
        Ok(order) => {
            notifier.publish(Notification::NewOrder(order.clone()));
            Ok(HttpResponse::Created().json(json!({
                "success": true,
                "data": order
            })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    tag = "orders",
    params(("id" = i64, Path, description = "Order id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order with items and discounts", body = OrderResponse),
        (status = 400, description = "Order not found", body = ApiError)
    )
)]
pub async fn get_my_order(
    req: HttpRequest,
    order_service: web::Data<OrderService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match order_service
        .get_order(OrderAccess::Owner(user.id), path.into_inner())
        .await
    {
        Ok(order) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": order
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/orders/{id}",
    tag = "orders",
    params(("id" = i64, Path, description = "Order id")),
    request_body = UpdateOwnOrderRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order updated", body = OrderResponse),
        (status = 400, description = "Invalid items or unknown order", body = ApiError)
    )
)]
pub async fn update_my_order(
    req: HttpRequest,
    order_service: web::Data<OrderService>,
    path: web::Path<i64>,
    request: web::Json<UpdateOwnOrderRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };
    let request = request.into_inner();

    match order_service
        .update_order(
            OrderAccess::Owner(user.id),
            path.into_inner(),
            None,
            request.status,
            request.items.as_deref(),
        )
        .await
    {
        Ok(order) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": order
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/orders/{id}/discount",
    tag = "orders",
    params(("id" = i64, Path, description = "Order id")),
    request_body = ApplyDiscountRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order plus the outcome of the coupon", body = ApplyDiscountResponse),
        (status = 400, description = "Unknown coupon or order", body = ApiError)
    )
)]
pub async fn apply_my_discount(
    req: HttpRequest,
    order_service: web::Data<OrderService>,
    path: web::Path<i64>,
    request: web::Json<ApplyDiscountRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    apply_discount(
        &order_service,
        OrderAccess::Owner(user.id),
        path.into_inner(),
        &request.code,
    )
    .await
}

#[utoipa::path(
    delete,
    path = "/orders/{id}",
    tag = "orders",
    params(("id" = i64, Path, description = "Order id")),
    request_body = RemoveDiscountRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Discount removed", body = OrderResponse),
        (status = 400, description = "Discount not on this order", body = ApiError)
    )
)]
pub async fn remove_my_discount(
    req: HttpRequest,
    order_service: web::Data<OrderService>,
    path: web::Path<i64>,
    request: web::Json<RemoveDiscountRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    remove_discount(
        &order_service,
        OrderAccess::Owner(user.id),
        path.into_inner(),
        request.discount_id,
    )
    .await
}

// Staff endpoints

#[utoipa::path(
    get,
    path = "/admin/orders",
    tag = "admin",
    params(
        ("page" = Option<u32>, Query, description = "Page number, from 1"),
        ("limit" = Option<u32>, Query, description = "Page size (max 100)"),
        ("status" = Option<OrderStatus>, Query, description = "Exact status"),
        ("id" = Option<String>, Query, description = "Order id substring")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order page")
    )
)]
pub async fn list_orders(
    order_service: web::Data<OrderService>,
    query: web::Query<OrderQuery>,
) -> Result<HttpResponse> {
    match order_service.list_orders(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/orders",
    tag = "admin",
    request_body = CreateOrderRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 400, description = "Invalid input", body = ApiError)
    )
)]
pub async fn create_order(
    order_service: web::Data<OrderService>,
    request: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse> {
    match order_service
        .create_order(request.user_id, request.status, &request.items)
        .await
    {
        Ok(order) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": order
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/orders/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "Order id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order", body = OrderResponse),
        (status = 400, description = "Order not found", body = ApiError)
    )
)]
pub async fn get_order(
    order_service: web::Data<OrderService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match order_service
        .get_order(OrderAccess::Any, path.into_inner())
        .await
    {
        Ok(order) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": order
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/orders/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "Order id")),
    request_body = UpdateOrderRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order updated", body = OrderResponse),
        (status = 400, description = "Invalid input or unknown order", body = ApiError)
    )
)]
pub async fn update_order(
    order_service: web::Data<OrderService>,
    path: web::Path<i64>,
    request: web::Json<UpdateOrderRequest>,
) -> Result<HttpResponse> {
    let request = request.into_inner();

    match order_service
        .update_order(
            OrderAccess::Any,
            path.into_inner(),
            request.user_id,
            request.status,
            request.items.as_deref(),
        )
        .await
    {
        Ok(order) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": order
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/orders/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "Order id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 400, description = "Order not found", body = ApiError)
    )
)]
pub async fn delete_order(
    order_service: web::Data<OrderService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match order_service.delete_order(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/orders/{id}/discount",
    tag = "admin",
    params(("id" = i64, Path, description = "Order id")),
    request_body = ApplyDiscountRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Order plus the outcome of the coupon", body = ApplyDiscountResponse),
        (status = 400, description = "Unknown coupon or order", body = ApiError)
    )
)]
pub async fn apply_order_discount(
    order_service: web::Data<OrderService>,
    path: web::Path<i64>,
    request: web::Json<ApplyDiscountRequest>,
) -> Result<HttpResponse> {
    apply_discount(
        &order_service,
        OrderAccess::Any,
        path.into_inner(),
        &request.code,
    )
    .await
}

#[utoipa::path(
    delete,
    path = "/admin/orders/{id}/discount",
    tag = "admin",
    params(("id" = i64, Path, description = "Order id")),
    request_body = RemoveDiscountRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Discount removed", body = OrderResponse),
        (status = 400, description = "Discount not on this order", body = ApiError)
    )
)]
pub async fn remove_order_discount(
    order_service: web::Data<OrderService>,
    path: web::Path<i64>,
    request: web::Json<RemoveDiscountRequest>,
) -> Result<HttpResponse> {
    remove_discount(
        &order_service,
        OrderAccess::Any,
        path.into_inner(),
        request.discount_id,
    )
    .await
}

async fn apply_discount(
    order_service: &OrderService,
    access: OrderAccess,
    id: i64,
    code: &str,
) -> Result<HttpResponse> {
    match order_service.apply_discount(access, id, code).await {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": result
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

async fn remove_discount(
    order_service: &OrderService,
    access: OrderAccess,
    id: i64,
    discount_id: i64,
) -> Result<HttpResponse> {
    match order_service.remove_discount(access, id, discount_id).await {
        Ok(order) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": order
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn order_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            .route("", web::get().to(list_my_orders))
            .route("", web::post().to(checkout))
            .route("/{id}", web::get().to(get_my_order))
            .route("/{id}", web::put().to(update_my_order))
            .route("/{id}/discount", web::put().to(apply_my_discount))
            .route("/{id}", web::delete().to(remove_my_discount)),
    );
}

pub fn order_admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            .route("", web::get().to(list_orders))
            .route("", web::post().to(create_order))
            .route("/{id}", web::get().to(get_order))
            .route("/{id}", web::put().to(update_order))
            .route("/{id}", web::delete().to(delete_order))
            .route("/{id}/discount", web::put().to(apply_order_discount))
            .route("/{id}/discount", web::delete().to(remove_order_discount)),
    );
}
