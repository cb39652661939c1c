pub mod audit;
pub mod coupon;
pub mod plan;
pub mod subscription;
pub mod user;
