use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;

use crate::auth;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::Coupon;
use crate::response::ApiResponse;
use crate::services::coupon::{self, NewCoupon};
use crate::state::AppState;

// POST /coupon
pub async fn create_coupon(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<NewCoupon>, JsonRejection>,
) -> Result<ApiResponse<Coupon>, AppError> {
    let principal = auth::authenticate(&headers, &state)?;
    auth::require_admin(&principal)?;
    let Json(input) = payload?;

    let created = coupon::create_coupon(&state.db(), input, Utc::now().naive_utc())?;
    Ok(ApiResponse::created(created, "Coupon created successfully"))
}

// GET /coupon
pub async fn list_coupons(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<ApiResponse<Vec<Coupon>>, AppError> {
    let principal = auth::authenticate(&headers, &state)?;
    auth::require_admin(&principal)?;

    let coupons = queries::list_coupons(&state.db(), false)?;
    Ok(ApiResponse::ok(coupons, "Coupons fetched successfully"))
}

// GET /coupon/public
pub async fn list_public_coupons(
    State(state): State<Arc<AppState>>,
) -> Result<ApiResponse<Vec<Coupon>>, AppError> {
    let coupons = queries::list_coupons(&state.db(), true)?;
    Ok(ApiResponse::ok(coupons, "Coupons fetched successfully"))
}
