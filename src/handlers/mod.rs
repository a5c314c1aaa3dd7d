pub mod admin;
pub mod auth;
pub mod category;
pub mod coupon;
pub mod image;
pub mod notification;
pub mod order;
pub mod product;
pub mod user;

pub use admin::admin_config;
pub use auth::auth_config;
pub use order::order_config;
pub use product::product_config;
