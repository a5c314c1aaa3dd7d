use actix_web::web;
use super::category::category_config;
use super::coupon::coupon_config;
use super::image::image_config;
use super::notification::notification_config;
use super::order::order_admin_config;
use super::product::product_admin_config;
use super::user::user_config;

/// Staff back office. Role checks for `/v1/admin` happen in `AuthMiddleware`.
pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .configure(category_config)
            .configure(coupon_config)
            .configure(image_config)
            .configure(notification_config)
            .configure(order_admin_config)
            .configure(product_admin_config)
            .configure(user_config),
    );
}
