use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use rust_decimal::Decimal;

use crate::models::{Booking, BookingStatus, PaymentStatus, User};
use crate::services::email::{EmailProvider, InlineImage, OutgoingEmail};
use crate::services::messaging::{self, MessagingProvider};
use crate::services::qr;

const QR_CONTENT_ID: &str = "booking_qr";

/// What the customer is told about a freshly created booking.
#[derive(Debug, Clone)]
pub struct BookingNotice {
    pub booking_id: String,
    pub first_name: String,
    pub user_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub total_amount: Decimal,
    pub final_amount: Decimal,
    pub number_of_guests: i32,
    pub created_at: NaiveDateTime,
}

impl BookingNotice {
    pub fn new(booking: &Booking, user: &User) -> Self {
        Self {
            booking_id: booking.id.clone(),
            first_name: user.first_name.clone(),
            user_name: user.full_name(),
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
            status: booking.status,
            payment_status: booking.payment_status,
            total_amount: booking.total_amount,
            final_amount: booking.final_amount,
            number_of_guests: booking.number_of_guests,
            created_at: booking.created_at,
        }
    }
}

/// Best-effort delivery. Implementations swallow and log their own failures.
#[async_trait]
pub trait BookingNotifier: Send + Sync {
    async fn booking_created(&self, notice: BookingNotice);
}

/// Runs the notifier on its own task so the caller never waits on delivery.
pub fn spawn_booking_created(notifier: Arc<dyn BookingNotifier>, notice: BookingNotice) {
    tokio::spawn(async move {
        notifier.booking_created(notice).await;
    });
}

pub struct CommsNotifier {
    messaging: Box<dyn MessagingProvider>,
    email: Box<dyn EmailProvider>,
    currency: String,
    utc_offset_minutes: i32,
}

impl CommsNotifier {
    pub fn new(
        messaging: Box<dyn MessagingProvider>,
        email: Box<dyn EmailProvider>,
        currency: String,
        utc_offset_minutes: i32,
    ) -> Self {
        Self {
            messaging,
            email,
            currency,
            utc_offset_minutes,
        }
    }

    async fn send_confirmation_email(&self, notice: &BookingNotice, to: &str) -> anyhow::Result<()> {
        let png = qr::qr_png(&notice.booking_id)?;
        let email = OutgoingEmail {
            to: to.to_string(),
            subject: "Your Booking Confirmation with QR Code".to_string(),
            html: email_html(notice, &self.currency, self.utc_offset_minutes),
            inline_image: Some(InlineImage {
                content_id: QR_CONTENT_ID.to_string(),
                png,
            }),
        };
        self.email.send_email(&email).await
    }
}

#[async_trait]
impl BookingNotifier for CommsNotifier {
    async fn booking_created(&self, notice: BookingNotice) {
        match notice.email.as_deref().filter(|e| !e.trim().is_empty()) {
            Some(to) => {
                if let Err(e) = self.send_confirmation_email(&notice, to).await {
                    tracing::error!(error = %e, booking_id = %notice.booking_id, "failed to send booking email");
                }
            }
            None => tracing::warn!(booking_id = %notice.booking_id, "user has no email, skipping confirmation"),
        }

        let Some(to) = notice.phone_number.as_deref().and_then(messaging::sms_recipient) else {
            return;
        };
        let text = sms_text(&notice, self.utc_offset_minutes);
        if let Err(e) = self.messaging.send_message(&to, &text).await {
            tracing::error!(error = %e, booking_id = %notice.booking_id, "failed to send booking SMS");
        }
    }
}

fn local_time(ts: NaiveDateTime, utc_offset_minutes: i32) -> String {
    (ts + Duration::minutes(utc_offset_minutes as i64))
        .format("%d/%m/%Y, %I:%M %p")
        .to_string()
}

pub fn sms_text(notice: &BookingNotice, utc_offset_minutes: i32) -> String {
    format!(
        "Dear {},\nYour booking registered for {}. Total Amount is {}.",
        notice.first_name,
        local_time(notice.created_at, utc_offset_minutes),
        notice.final_amount
    )
}

pub fn email_html(notice: &BookingNotice, currency: &str, utc_offset_minutes: i32) -> String {
    let row = |label: &str, value: String| {
        format!(
            r#"<tr><td style="padding:8px;border:1px solid #ddd;">{label}</td><td style="padding:8px;border:1px solid #ddd;">{value}</td></tr>"#
        )
    };
    let rows = [
        row("Booking ID", notice.booking_id.clone()),
        row("Total Amount", format!("{} {currency}", notice.total_amount)),
        row("Final Amount", format!("{} {currency}", notice.final_amount)),
        row("Guests", notice.number_of_guests.to_string()),
        row("Status", notice.status.as_str().to_string()),
        row("Payment Status", notice.payment_status.as_str().to_string()),
        row("Created At", local_time(notice.created_at, utc_offset_minutes)),
    ]
    .join("\n");

    format!(
        r#"<div style="font-family: Arial, sans-serif; color: #333;">
  <h2 style="color: #4CAF50;">Booking Confirmation</h2>
  <p>Hello <b>{name}</b>,</p>
  <p>Your booking has been received successfully. Here are your details:</p>
  <table style="border-collapse: collapse; width: 100%; margin: 20px 0;">
{rows}
  </table>
  <p>Scan the QR code below to view your booking details quickly:</p>
  <div style="text-align:center; margin-top:20px;">
    <img src="cid:{QR_CONTENT_ID}" alt="Booking QR Code" style="width:200px; height:200px;" />
  </div>
</div>"#,
        name = notice.user_name,
    )
}
