use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{CouponScope, DiscountType, OrderStatus};
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::product::list_products,
        handlers::product::get_product,
        handlers::product::create_product,
        handlers::product::update_product,
        handlers::product::delete_product,
        handlers::order::list_my_orders,
        handlers::order::checkout,
        handlers::order::get_my_order,
        handlers::order::update_my_order,
        handlers::order::apply_my_discount,
        handlers::order::remove_my_discount,
        handlers::order::list_orders,
        handlers::order::create_order,
        handlers::order::get_order,
        handlers::order::update_order,
        handlers::order::delete_order,
        handlers::order::apply_order_discount,
        handlers::order::remove_order_discount,
        handlers::category::list_categories,
        handlers::category::create_category,
        handlers::category::get_category,
        handlers::category::update_category,
        handlers::category::delete_category,
        handlers::coupon::list_coupons,
        handlers::coupon::create_coupon,
        handlers::coupon::get_coupon,
        handlers::coupon::update_coupon,
        handlers::coupon::delete_coupon,
        handlers::image::list_images,
        handlers::image::upload_images,
        handlers::image::get_image,
        handlers::image::update_image,
        handlers::image::delete_image,
        handlers::notification::notifications,
        handlers::user::list_users,
        handlers::user::create_user,
        handlers::user::get_user,
        handlers::user::update_user,
        handlers::user::delete_user,
    ),
    components(
        schemas(
            ApiError,
            RegisterRequest,
            LoginRequest,
            RefreshTokenRequest,
            AuthResponse,
            UserResponse,
            UserSummary,
            CreateUserRequest,
            UpdateUserRequest,
            UserQuery,
            CategoryResponse,
            CreateCategoryRequest,
            UpdateCategoryRequest,
            CategoryQuery,
            ProductResponse,
            CreateProductRequest,
            UpdateProductRequest,
            ProductQuery,
            ImageResponse,
            UpdateImageRequest,
            ImageQuery,
            UploadError,
            UploadResponse,
            CouponResponse,
            CouponDetailResponse,
            CreateCouponRequest,
            UpdateCouponRequest,
            CouponQuery,
            DiscountResponse,
            DiscountType,
            CouponScope,
            OrderStatus,
            OrderItemPayload,
            OrderItemResponse,
            OrderResponse,
            CreateOrderRequest,
            UpdateOrderRequest,
            CheckoutRequest,
            UpdateOwnOrderRequest,
            ApplyDiscountRequest,
            RemoveDiscountRequest,
            DiscountInfo,
            ApplyDiscountResponse,
            OrderQuery,
            OwnOrderQuery,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login and token refresh"),
        (name = "products", description = "Public catalog"),
        (name = "orders", description = "Customer orders and coupons"),
        (name = "admin", description = "Back office: catalog, coupons, images, orders and users"),
    ),
    info(
        title = "Storefront Backend API",
        version = "1.0.0",
        description = "Storefront Backend REST API documentation"
    ),
    servers(
        (url = "/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_discount_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/orders/{id}/discount"));
        assert!(doc.paths.paths.contains_key("/admin/orders/{id}/discount"));
        assert!(doc.paths.paths.contains_key("/admin/images"));
        assert!(doc.paths.paths.contains_key("/admin/notifications"));
    }
}
