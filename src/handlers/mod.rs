pub mod booking;
pub mod coupon;
pub mod health;
pub mod slot;
