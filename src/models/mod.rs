pub mod category;
pub mod common;
pub mod coupon;
pub mod image;
pub mod order;
pub mod pagination;
pub mod product;
pub mod user;

pub use category::*;
pub use common::*;
pub use coupon::*;
pub use image::*;
pub use order::*;
pub use pagination::*;
pub use product::*;
pub use user::*;
