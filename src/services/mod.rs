pub mod auth_service;
pub mod category_service;
pub mod coupon_service;
pub mod discount_rules;
pub mod image_service;
pub mod item_sync;
pub mod order_service;
pub mod product_service;
pub mod user_service;


pub use auth_service::*;
pub use category_service::*;
pub use coupon_service::*;
pub use image_service::*;
pub use order_service::*;
pub use product_service::*;
pub use user_service::*;
