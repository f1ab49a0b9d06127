use std::collections::HashSet;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::auth::Principal;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Booking, BookingMeta, BookingStatus, Discount, GroundSummary, PaymentStatus, TimeSlot,
    UserSummary,
};
use crate::services::coupon::{self, Discountable};
use crate::services::notification::BookingNotice;
use crate::services::slot_store;

fn default_guests() -> i32 {
    2
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub ground_id: String,
    #[serde(default)]
    pub slots: Vec<String>,
    #[serde(default = "default_guests")]
    pub number_of_guests: i32,
}

/// A booking with its references resolved against current data.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: Booking,
    pub user: Option<UserSummary>,
    pub ground: Option<GroundSummary>,
    pub slot_details: Vec<TimeSlot>,
}

impl Discountable for Booking {
    fn subtotal(&self) -> Decimal {
        self.total_amount
    }

    fn is_open_for_discount(&self) -> bool {
        self.status == BookingStatus::Pending
    }

    fn set_discount(&mut self, discount: &Discount, now: NaiveDateTime) {
        self.apply_discount(discount, now);
    }

    fn remove_discount(&mut self, now: NaiveDateTime) {
        self.clear_discount(now);
    }
}

fn validate_slot_ids(slot_ids: &[String], missing_message: &str) -> Result<(), AppError> {
    if slot_ids.is_empty() || slot_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(AppError::Validation(missing_message.to_string()));
    }
    let unique: HashSet<&String> = slot_ids.iter().collect();
    if unique.len() != slot_ids.len() {
        return Err(AppError::Validation("Duplicate slot IDs are not allowed".to_string()));
    }
    Ok(())
}

fn load_owned(conn: &Connection, principal: &Principal, booking_id: &str) -> Result<Booking, AppError> {
    let booking = queries::get_booking_by_id(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if !principal.can_act_for(&booking.user_id) {
        tracing::warn!(booking_id = %booking_id, user_id = %principal.id, "booking access denied");
        return Err(AppError::Forbidden(
            "You do not have access to this booking".to_string(),
        ));
    }
    Ok(booking)
}

fn snapshot(
    conn: &Connection,
    booking: &Booking,
    slot_ids: &[String],
    now: NaiveDateTime,
) -> Result<BookingMeta, AppError> {
    Ok(BookingMeta {
        user: queries::get_user(conn, &booking.user_id)?.map(|u| u.summary()),
        ground: queries::get_ground(conn, &booking.ground_id)?.map(|g| g.summary()),
        slots: queries::get_slots_by_ids(conn, &booking.ground_id, slot_ids)?,
        captured_at: now,
    })
}

/// Claims the requested slots and records a pending booking for the caller. The
/// returned notice, if any, should be delivered once the caller is done.
pub fn create_booking(
    conn: &mut Connection,
    principal: &Principal,
    input: NewBooking,
    now: NaiveDateTime,
) -> Result<(Booking, Option<BookingNotice>), AppError> {
    if input.ground_id.trim().is_empty() {
        return Err(AppError::Validation("Missing required fields".to_string()));
    }
    validate_slot_ids(&input.slots, "Missing required fields")?;
    if input.number_of_guests < 1 {
        return Err(AppError::Validation(
            "Number of guests must be at least 1".to_string(),
        ));
    }

    let ground = queries::find_active_ground(conn, &input.ground_id)?
        .ok_or_else(|| AppError::NotFound("Ground not found".to_string()))?;

    let tx = conn.transaction()?;
    let claimed = slot_store::claim_all(&tx, &ground.id, &input.slots, &principal.id)?.ok_or_else(|| {
        AppError::Rejected("Some provided slot IDs are invalid or already booked".to_string())
    })?;

    let total_amount: Decimal = claimed
        .iter()
        .map(|slot| slot.price_or(ground.price_per_hour))
        .sum();

    let booking = Booking::new_pending(
        &principal.id,
        &ground.id,
        input.slots,
        total_amount,
        input.number_of_guests,
        now,
    );
    queries::insert_booking(&tx, &booking)?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        user_id = %booking.user_id,
        ground_id = %booking.ground_id,
        total = %booking.total_amount,
        "booking created"
    );

    let notice = queries::get_user(conn, &booking.user_id)?.map(|user| BookingNotice::new(&booking, &user));
    Ok((booking, notice))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    pub order_id: String,
    pub status: String,
    pub payment_details: Option<serde_json::Value>,
}

/// Marks the booking paid and confirmed. A second confirmation is refused without
/// touching the stored payment details or snapshot.
pub fn confirm_payment(
    conn: &mut Connection,
    principal: &Principal,
    input: PaymentResult,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    if input.status != "success" {
        return Err(AppError::Rejected("Payment not successful".to_string()));
    }

    let mut booking = load_owned(conn, principal, &input.order_id)?;
    if booking.payment_status == PaymentStatus::Paid {
        return Err(AppError::Conflict("Booking already completed".to_string()));
    }
    if booking.status == BookingStatus::Cancelled {
        return Err(AppError::Conflict("Booking is cancelled".to_string()));
    }

    let meta = snapshot(conn, &booking, &booking.slots, now)?;
    booking.confirm(
        input.payment_details.unwrap_or(serde_json::Value::Null),
        meta,
        now,
    );

    if !queries::record_booking_payment(conn, &booking)? {
        return Err(AppError::Conflict("Booking already completed".to_string()));
    }

    tracing::info!(booking_id = %booking.id, "booking payment confirmed");
    Ok(booking)
}

/// Swaps the booking onto `new_slot_ids`. Release, claim and update commit
/// together, so a refused reschedule leaves the original slots held.
pub fn reschedule_booking(
    conn: &mut Connection,
    principal: &Principal,
    booking_id: &str,
    new_slot_ids: Vec<String>,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    if booking_id.trim().is_empty() {
        return Err(AppError::Validation(
            "Booking ID and new slot IDs are required".to_string(),
        ));
    }
    validate_slot_ids(&new_slot_ids, "Booking ID and new slot IDs are required")?;

    let mut booking = load_owned(conn, principal, booking_id)?;
    if booking.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "Cannot reschedule a {} booking",
            booking.status.as_str()
        )));
    }

    let tx = conn.transaction()?;
    slot_store::release_all(&tx, &booking.slots)?;
    slot_store::claim_all(&tx, &booking.ground_id, &new_slot_ids, &booking.user_id)?.ok_or_else(
        || AppError::Rejected("Some new slots are already booked or invalid".to_string()),
    )?;

    let meta = snapshot(&tx, &booking, &new_slot_ids, now)?;
    booking.reschedule(new_slot_ids, meta, now);

    queries::update_booking(&tx, &booking)?;
    tx.commit()?;

    tracing::info!(booking_id = %booking.id, slots = booking.slots.len(), "booking rescheduled");
    Ok(booking)
}

pub fn cancel_booking(
    conn: &mut Connection,
    principal: &Principal,
    booking_id: &str,
    reason: Option<String>,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    if booking_id.trim().is_empty() {
        return Err(AppError::Validation("Booking ID is required".to_string()));
    }

    let mut booking = load_owned(conn, principal, booking_id)?;
    if booking.status == BookingStatus::Cancelled {
        return Err(AppError::Conflict("Booking is already cancelled".to_string()));
    }
    if booking.status == BookingStatus::Completed || booking.payment_status == PaymentStatus::Paid {
        return Err(AppError::Rejected(
            "Completed bookings cannot be cancelled".to_string(),
        ));
    }

    let tx = conn.transaction()?;
    let released = slot_store::release_all(&tx, &booking.slots)?;
    booking.cancel(reason.filter(|r| !r.trim().is_empty()), now);
    queries::update_booking(&tx, &booking)?;
    tx.commit()?;

    tracing::info!(booking_id = %booking.id, released, "booking cancelled");
    Ok(booking)
}

pub fn apply_coupon(
    conn: &Connection,
    principal: &Principal,
    booking_id: &str,
    coupon_code: &str,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    if booking_id.trim().is_empty() || coupon_code.trim().is_empty() {
        return Err(AppError::Validation(
            "Booking ID and Coupon Code are required".to_string(),
        ));
    }

    let mut booking = load_owned(conn, principal, booking_id)?;
    let discount = coupon::apply(conn, &mut booking, coupon_code, now)?;
    queries::update_booking(conn, &booking)?;

    tracing::info!(
        booking_id = %booking.id,
        coupon_id = %discount.coupon_id,
        discount = %discount.discount_amount,
        "coupon applied"
    );
    Ok(booking)
}

pub fn remove_coupon(
    conn: &Connection,
    principal: &Principal,
    booking_id: &str,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    if booking_id.trim().is_empty() {
        return Err(AppError::Validation("Booking ID is required".to_string()));
    }

    let mut booking = load_owned(conn, principal, booking_id)?;
    coupon::revert(&mut booking, now)?;
    queries::update_booking(conn, &booking)?;

    tracing::info!(booking_id = %booking.id, "coupon removed");
    Ok(booking)
}

pub fn get_booking_detail(
    conn: &Connection,
    principal: &Principal,
    booking_id: &str,
) -> Result<BookingDetail, AppError> {
    let booking = load_owned(conn, principal, booking_id)?;
    let user = queries::get_user(conn, &booking.user_id)?.map(|u| u.summary());
    let ground = queries::get_ground(conn, &booking.ground_id)?.map(|g| g.summary());
    let slot_details = queries::get_slots_by_ids(conn, &booking.ground_id, &booking.slots)?;

    Ok(BookingDetail {
        booking,
        user,
        ground,
        slot_details,
    })
}
