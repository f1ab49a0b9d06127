use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::Deserialize;

use crate::auth::{self, Principal};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{NewTimeSlot, Role, SlotDocument, TimeSlot};
use crate::response::ApiResponse;
use crate::services::slot_store;
use crate::state::AppState;

/// Admins manage every ground's slots; ground accounts only their own.
fn check_ground_manager(conn: &Connection, principal: &Principal, ground_id: &str) -> Result<(), AppError> {
    if principal.is_admin() {
        return Ok(());
    }
    if principal.role == Role::Ground {
        if let Some(ground) = queries::get_ground(conn, ground_id)? {
            if ground.owner_id == principal.id {
                return Ok(());
            }
        }
    }
    Err(AppError::Forbidden(
        "You cannot manage slots for this ground".to_string(),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSlotsRequest {
    ground_id: String,
    slots: Vec<NewTimeSlot>,
}

// POST /slot
pub async fn create_slots(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CreateSlotsRequest>, JsonRejection>,
) -> Result<ApiResponse<Vec<TimeSlot>>, AppError> {
    let principal = auth::authenticate(&headers, &state)?;
    let Json(req) = payload?;

    let created = {
        let mut db = state.db();
        check_ground_manager(&db, &principal, &req.ground_id)?;
        slot_store::create_slots(&mut db, &req.ground_id, &req.slots)?
    };

    Ok(ApiResponse::created(created, "Timeslots created successfully"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSlotRequest {
    ground_id: String,
    #[serde(flatten)]
    slot: NewTimeSlot,
}

// POST /slot/add
pub async fn add_slot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<AddSlotRequest>, JsonRejection>,
) -> Result<ApiResponse<TimeSlot>, AppError> {
    let principal = auth::authenticate(&headers, &state)?;
    let Json(req) = payload?;

    let added = {
        let mut db = state.db();
        check_ground_manager(&db, &principal, &req.ground_id)?;
        slot_store::add_slot(&mut db, &req.ground_id, &req.slot)?
    };

    Ok(ApiResponse::created(added, "Timeslot added successfully"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotsQuery {
    ground_id: String,
    date: Option<NaiveDate>,
}

// GET /slot?groundId=&date=
pub async fn get_slots(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<SlotsQuery>, QueryRejection>,
) -> Result<ApiResponse<SlotDocument>, AppError> {
    auth::authenticate(&headers, &state)?;
    let Query(query) = query?;

    let document = slot_store::slots_by_date(&state.db(), &query.ground_id, query.date)?;
    Ok(ApiResponse::ok(document, "Slots fetched successfully"))
}

// GET /slot/:ground_id
pub async fn get_upcoming_slots(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(ground_id): Path<String>,
) -> Result<ApiResponse<Vec<TimeSlot>>, AppError> {
    auth::authenticate(&headers, &state)?;

    let today = Utc::now().date_naive();
    let slots = slot_store::upcoming_slots(&state.db(), &ground_id, today)?;
    Ok(ApiResponse::ok(slots, "Slots fetched successfully"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSlotRequest {
    slot_id: String,
    ground_id: String,
}

// DELETE /slot
pub async fn delete_slot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<DeleteSlotRequest>, JsonRejection>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let principal = auth::authenticate(&headers, &state)?;
    let Json(req) = payload?;

    {
        let db = state.db();
        check_ground_manager(&db, &principal, &req.ground_id)?;
        slot_store::delete_slot(&db, &req.ground_id, &req.slot_id)?;
    }

    Ok(ApiResponse::ok(
        serde_json::json!({"slotId": req.slot_id}),
        "Slot deleted successfully",
    ))
}
