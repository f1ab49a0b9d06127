use chrono::NaiveDateTime;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Coupon, CouponStatus, CouponType, Discount};

/// Anything priced from a subtotal that a coupon can be attached to.
pub trait Discountable {
    fn subtotal(&self) -> Decimal;
    /// Coupons may only be attached or detached while this holds.
    fn is_open_for_discount(&self) -> bool;
    fn set_discount(&mut self, discount: &Discount, now: NaiveDateTime);
    fn remove_discount(&mut self, now: NaiveDateTime);
}

pub fn calculate_discount(coupon: &Coupon, subtotal: Decimal) -> Decimal {
    let raw = match coupon.kind {
        CouponType::Flat => coupon.discount_value,
        CouponType::Percentage => {
            let pct = subtotal * coupon.discount_value / Decimal::ONE_HUNDRED;
            match coupon.max_discount_amount {
                Some(cap) => pct.min(cap),
                None => pct,
            }
        }
    };
    raw.round_dp(2).max(Decimal::ZERO).min(subtotal)
}

/// Status, validity window and minimum amount checks, in that order.
pub fn check_applicable(coupon: &Coupon, subtotal: Decimal, now: NaiveDateTime) -> Result<(), AppError> {
    if coupon.status != CouponStatus::Active {
        return Err(AppError::Rejected("Coupon is not active".to_string()));
    }
    if now < coupon.start_date {
        return Err(AppError::Rejected("Coupon is not yet valid".to_string()));
    }
    if now > coupon.end_date {
        return Err(AppError::Rejected("Coupon has expired".to_string()));
    }
    if let Some(min) = coupon.min_booking_amount {
        if subtotal < min {
            return Err(AppError::Rejected(format!(
                "Minimum booking amount should be {min}"
            )));
        }
    }
    Ok(())
}

pub fn evaluate(
    conn: &Connection,
    code: &str,
    subtotal: Decimal,
    now: NaiveDateTime,
) -> Result<Discount, AppError> {
    let code = code.trim().to_uppercase();
    let coupon = queries::get_coupon_by_code(conn, &code)?
        .ok_or_else(|| AppError::NotFound("Invalid coupon code".to_string()))?;

    check_applicable(&coupon, subtotal, now)?;

    let discount_amount = calculate_discount(&coupon, subtotal);
    Ok(Discount {
        coupon_id: coupon.id,
        discount_amount,
        final_amount: subtotal - discount_amount,
    })
}

pub fn apply<E: Discountable>(
    conn: &Connection,
    entity: &mut E,
    code: &str,
    now: NaiveDateTime,
) -> Result<Discount, AppError> {
    if !entity.is_open_for_discount() {
        return Err(AppError::Rejected(
            "Coupon can only be applied on pending orders".to_string(),
        ));
    }
    let discount = evaluate(conn, code, entity.subtotal(), now)?;
    entity.set_discount(&discount, now);
    Ok(discount)
}

pub fn revert<E: Discountable>(entity: &mut E, now: NaiveDateTime) -> Result<(), AppError> {
    if !entity.is_open_for_discount() {
        return Err(AppError::Rejected(
            "Coupon can only be removed from pending orders".to_string(),
        ));
    }
    entity.remove_discount(now);
    Ok(())
}

// ── Administration ──

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCoupon {
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: CouponType,
    pub discount_value: Decimal,
    pub min_booking_amount: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub status: Option<CouponStatus>,
    pub is_public: Option<bool>,
}

pub fn create_coupon(conn: &Connection, input: NewCoupon, now: NaiveDateTime) -> Result<Coupon, AppError> {
    let code = input.code.trim().to_uppercase();
    if code.is_empty() || input.title.trim().is_empty() {
        return Err(AppError::Validation("Coupon code and title are required".to_string()));
    }
    if input.discount_value <= Decimal::ZERO {
        return Err(AppError::Validation("Discount value must be greater than 0".to_string()));
    }
    if input.kind == CouponType::Percentage && input.discount_value > Decimal::ONE_HUNDRED {
        return Err(AppError::Validation(
            "Percentage discount cannot exceed 100".to_string(),
        ));
    }
    if input.start_date >= input.end_date {
        return Err(AppError::Validation("Start date must be before end date".to_string()));
    }
    if queries::get_coupon_by_code(conn, &code)?.is_some() {
        return Err(AppError::Conflict("Coupon code already exists".to_string()));
    }

    let coupon = Coupon {
        id: uuid::Uuid::new_v4().to_string(),
        code,
        title: input.title.trim().to_string(),
        description: input.description,
        kind: input.kind,
        discount_value: input.discount_value,
        min_booking_amount: input.min_booking_amount,
        max_discount_amount: match input.kind {
            CouponType::Percentage => input.max_discount_amount,
            CouponType::Flat => None,
        },
        start_date: input.start_date,
        end_date: input.end_date,
        status: input.status.unwrap_or(CouponStatus::Active),
        is_public: input.is_public.unwrap_or(true),
        created_at: now,
    };
    queries::insert_coupon(conn, &coupon)?;

    tracing::info!(coupon_id = %coupon.id, code = %coupon.code, "coupon created");
    Ok(coupon)
}
