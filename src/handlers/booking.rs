use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::auth;
use crate::db::queries::{self, AdminBookingRow, TransactionRow, UserBooking};
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus};
use crate::response::ApiResponse;
use crate::services::booking::{self, BookingDetail, NewBooking, PaymentResult};
use crate::services::notification;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

// POST /booking
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<NewBooking>, JsonRejection>,
) -> Result<ApiResponse<Booking>, AppError> {
    let principal = auth::authenticate(&headers, &state)?;
    let Json(input) = payload?;

    let (created, notice) = {
        let mut db = state.db();
        booking::create_booking(&mut db, &principal, input, Utc::now().naive_utc())?
    };

    if let Some(notice) = notice {
        notification::spawn_booking_created(Arc::clone(&state.notifier), notice);
    }

    Ok(ApiResponse::ok(created, "Booking created successfully"))
}

// PUT /booking
pub async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<PaymentResult>, JsonRejection>,
) -> Result<ApiResponse<Booking>, AppError> {
    let principal = auth::authenticate(&headers, &state)?;
    let Json(input) = payload?;

    let confirmed = {
        let mut db = state.db();
        booking::confirm_payment(&mut db, &principal, input, Utc::now().naive_utc())?
    };

    Ok(ApiResponse::ok(confirmed, "Booking finalized after payment"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
    #[serde(default)]
    booking_id: String,
    #[serde(default)]
    new_slot_ids: Vec<String>,
}

// PUT /booking/reschedule
pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<RescheduleRequest>, JsonRejection>,
) -> Result<ApiResponse<Booking>, AppError> {
    let principal = auth::authenticate(&headers, &state)?;
    let Json(req) = payload?;

    let moved = {
        let mut db = state.db();
        booking::reschedule_booking(
            &mut db,
            &principal,
            &req.booking_id,
            req.new_slot_ids,
            Utc::now().naive_utc(),
        )?
    };

    Ok(ApiResponse::ok(moved, "Booking rescheduled successfully"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    #[serde(default)]
    booking_id: String,
    reason: Option<String>,
}

// PUT /booking/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CancelRequest>, JsonRejection>,
) -> Result<ApiResponse<Booking>, AppError> {
    let principal = auth::authenticate(&headers, &state)?;
    let Json(req) = payload?;

    let cancelled = {
        let mut db = state.db();
        booking::cancel_booking(
            &mut db,
            &principal,
            &req.booking_id,
            req.reason,
            Utc::now().naive_utc(),
        )?
    };

    Ok(ApiResponse::ok(cancelled, "Booking cancelled successfully"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponRequest {
    #[serde(default)]
    booking_id: String,
    #[serde(default)]
    coupon_code: String,
}

// POST /booking/apply
pub async fn apply_coupon(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CouponRequest>, JsonRejection>,
) -> Result<ApiResponse<Booking>, AppError> {
    let principal = auth::authenticate(&headers, &state)?;
    let Json(req) = payload?;

    let updated = booking::apply_coupon(
        &state.db(),
        &principal,
        &req.booking_id,
        &req.coupon_code,
        Utc::now().naive_utc(),
    )?;

    Ok(ApiResponse::ok(updated, "Coupon applied successfully"))
}

// POST /booking/remove
pub async fn remove_coupon(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CouponRequest>, JsonRejection>,
) -> Result<ApiResponse<Booking>, AppError> {
    let principal = auth::authenticate(&headers, &state)?;
    let Json(req) = payload?;

    let updated = booking::remove_coupon(
        &state.db(),
        &principal,
        &req.booking_id,
        Utc::now().naive_utc(),
    )?;

    Ok(ApiResponse::ok(updated, "Coupon removed successfully"))
}

// GET /booking/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<ApiResponse<BookingDetail>, AppError> {
    let principal = auth::authenticate(&headers, &state)?;
    let detail = booking::get_booking_detail(&state.db(), &principal, &id)?;
    Ok(ApiResponse::ok(detail, "Booking fetched successfully"))
}

// GET /booking/users
pub async fn get_user_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<ApiResponse<Vec<UserBooking>>, AppError> {
    let principal = auth::authenticate(&headers, &state)?;
    let bookings = queries::get_bookings_for_user(&state.db(), &principal.id)?;
    Ok(ApiResponse::ok(bookings, "User bookings fetched successfully"))
}

#[derive(Deserialize)]
pub struct BookingsQuery {
    status: Option<String>,
    limit: Option<i64>,
}

// GET /booking
pub async fn get_all_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<BookingsQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<AdminBookingRow>>, AppError> {
    let principal = auth::authenticate(&headers, &state)?;
    auth::require_admin(&principal)?;
    let Query(query) = query?;

    let status_filter = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => {
            let status = BookingStatus::parse(raw);
            if status.as_str() != raw {
                return Err(AppError::Validation(format!("Invalid status filter: {raw}")));
            }
            Some(status)
        }
        None => None,
    };

    let bookings = queries::get_all_bookings(&state.db(), status_filter, clamp_limit(query.limit))?;
    Ok(ApiResponse::ok(bookings, "All bookings fetched successfully"))
}

#[derive(Deserialize)]
pub struct TransactionsQuery {
    limit: Option<i64>,
}

// GET /booking/transactions
pub async fn get_transactions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<TransactionsQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<TransactionRow>>, AppError> {
    let principal = auth::authenticate(&headers, &state)?;
    auth::require_admin(&principal)?;
    let Query(query) = query?;

    let transactions = queries::get_transactions(&state.db(), clamp_limit(query.limit))?;
    Ok(ApiResponse::ok(transactions, "Transactions fetched successfully"))
}
