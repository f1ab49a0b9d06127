use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: String,
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
    pub status: CouponStatus,
    pub is_public: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CouponType {
    Flat,
    Percentage,
}

impl CouponType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponType::Flat => "flat",
            CouponType::Percentage => "percentage",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "percentage" => CouponType::Percentage,
            _ => CouponType::Flat,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CouponStatus {
    Active,
    Expired,
    Inactive,
    Upcoming,
}

impl CouponStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponStatus::Active => "active",
            CouponStatus::Expired => "expired",
            CouponStatus::Inactive => "inactive",
            CouponStatus::Upcoming => "upcoming",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "active" => CouponStatus::Active,
            "expired" => CouponStatus::Expired,
            "upcoming" => CouponStatus::Upcoming,
            _ => CouponStatus::Inactive,
        }
    }
}

/// Outcome of evaluating a coupon against a subtotal.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Discount {
    pub coupon_id: String,
    pub discount_amount: Decimal,
    pub final_amount: Decimal,
}
