pub mod categories;
pub mod coupon_products;
pub mod coupon_users;
pub mod coupons;
pub mod discounts;
pub mod images;
pub mod order_items;
pub mod orders;
pub mod products;
pub mod refresh_tokens;
pub mod roles;
pub mod user_roles;
pub mod users;

pub use categories as category_entity;
pub use coupon_products as coupon_product_entity;
pub use coupon_users as coupon_user_entity;
pub use coupons as coupon_entity;
pub use coupons::{CouponScope, DiscountType};
pub use discounts as discount_entity;
pub use images as image_entity;
pub use order_items as order_item_entity;
pub use orders as order_entity;
pub use orders::OrderStatus;
pub use products as product_entity;
pub use refresh_tokens as refresh_token_entity;
pub use roles as role_entity;
pub use user_roles as user_role_entity;
pub use users as user_entity;
