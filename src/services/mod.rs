pub mod booking;
pub mod coupon;
pub mod email;
pub mod messaging;
pub mod notification;
pub mod qr;
pub mod slot_store;
