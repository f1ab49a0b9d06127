use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Discount, GroundSummary, TimeSlot, UserSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub ground_id: String,
    /// Slot ids in the order they were requested.
    pub slots: Vec<String>,
    pub total_amount: Decimal,
    pub discount_amount: Decimal,
    pub final_amount: Decimal,
    pub number_of_guests: i32,
    pub coupon_id: Option<String>,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    pub payment_details: Option<serde_json::Value>,
    pub meta: Option<BookingMeta>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub rescheduled: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    pub fn new_pending(
        user_id: &str,
        ground_id: &str,
        slots: Vec<String>,
        total_amount: Decimal,
        number_of_guests: i32,
        now: NaiveDateTime,
    ) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let payment_id = format!(
            "PAY_{}_{}",
            now.and_utc().timestamp_millis(),
            &id[..8]
        );
        Self {
            id,
            user_id: user_id.to_string(),
            ground_id: ground_id.to_string(),
            slots,
            total_amount,
            discount_amount: Decimal::ZERO,
            final_amount: total_amount,
            number_of_guests,
            coupon_id: None,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_id: Some(payment_id),
            payment_details: None,
            meta: None,
            cancellation_reason: None,
            cancelled_at: None,
            rescheduled: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_discount(&mut self, discount: &Discount, now: NaiveDateTime) {
        self.discount_amount = discount.discount_amount;
        self.final_amount = self.total_amount - discount.discount_amount;
        self.coupon_id = Some(discount.coupon_id.clone());
        self.updated_at = now;
    }

    pub fn clear_discount(&mut self, now: NaiveDateTime) {
        self.discount_amount = Decimal::ZERO;
        self.final_amount = self.total_amount;
        self.coupon_id = None;
        self.updated_at = now;
    }

    pub fn confirm(
        &mut self,
        payment_details: serde_json::Value,
        meta: BookingMeta,
        now: NaiveDateTime,
    ) {
        self.meta = Some(meta);
        self.payment_details = Some(payment_details);
        self.payment_status = PaymentStatus::Paid;
        self.status = BookingStatus::Confirmed;
        self.updated_at = now;
    }

    pub fn reschedule(&mut self, new_slots: Vec<String>, meta: BookingMeta, now: NaiveDateTime) {
        self.slots = new_slots;
        self.meta = Some(meta);
        self.status = BookingStatus::Rescheduled;
        self.rescheduled = true;
        self.updated_at = now;
    }

    pub fn cancel(&mut self, reason: Option<String>, now: NaiveDateTime) {
        self.status = BookingStatus::Cancelled;
        self.cancellation_reason = reason;
        self.cancelled_at = Some(now);
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Rescheduled,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Rescheduled => "rescheduled",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => BookingStatus::Confirmed,
            "completed" => BookingStatus::Completed,
            "rescheduled" => BookingStatus::Rescheduled,
            "cancelled" => BookingStatus::Cancelled,
            _ => BookingStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "paid" => PaymentStatus::Paid,
            "failed" => PaymentStatus::Failed,
            "refunded" => PaymentStatus::Refunded,
            _ => PaymentStatus::Pending,
        }
    }
}

/// Write-once copy of the user, ground and slots as they were when the booking was
/// confirmed (or last rescheduled). Not a live view: re-fetch for current data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingMeta {
    pub user: Option<UserSummary>,
    pub ground: Option<GroundSummary>,
    pub slots: Vec<TimeSlot>,
    pub captured_at: NaiveDateTime,
}
