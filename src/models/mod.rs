pub mod booking;
pub mod coupon;
pub mod ground;
pub mod slot;
pub mod user;

pub use booking::{Booking, BookingMeta, BookingStatus, PaymentStatus};
pub use coupon::{Coupon, CouponStatus, CouponType, Discount};
pub use ground::{Ground, GroundStatus, GroundSummary};
pub use slot::{NewTimeSlot, SlotDocument, TimeSlot};
pub use user::{Role, User, UserSummary};
