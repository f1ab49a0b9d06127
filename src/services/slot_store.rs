//! Per-ground slot documents and the claim/release protocol bookings rely on.
//!
//! A slot is held by at most one booking. Claims are conditional single-row updates
//! and `claim_all` only ever runs inside a caller-owned transaction, so a set of
//! slots is either held completely or not at all.

use chrono::{Duration, NaiveDate};
use rusqlite::{Connection, Transaction};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{NewTimeSlot, SlotDocument, TimeSlot};

const UPCOMING_WINDOW_DAYS: i64 = 30;

pub fn query_available(
    conn: &Connection,
    ground_id: &str,
    slot_ids: &[String],
) -> Result<Vec<TimeSlot>, AppError> {
    Ok(queries::query_available_slots(conn, ground_id, slot_ids)?)
}

/// Claims every slot in `slot_ids` for `user_id`, in order. Returns `None` as soon
/// as one of them is unknown, foreign to the ground or already held; the caller
/// must then drop `tx` without committing so earlier claims roll back.
pub fn claim_all(
    tx: &Transaction,
    ground_id: &str,
    slot_ids: &[String],
    user_id: &str,
) -> Result<Option<Vec<TimeSlot>>, AppError> {
    let available = query_available(tx, ground_id, slot_ids)?;
    if available.len() != slot_ids.len() {
        return Ok(None);
    }

    let mut claimed = Vec::with_capacity(slot_ids.len());
    for slot_id in slot_ids {
        if !queries::claim_time_slot(tx, ground_id, slot_id, user_id)? {
            tracing::warn!(slot_id = %slot_id, ground_id = %ground_id, "slot claimed concurrently");
            return Ok(None);
        }
        if let Some(slot) = available.iter().find(|s| &s.id == slot_id) {
            let mut slot = slot.clone();
            slot.is_booked = true;
            slot.booked_by = Some(user_id.to_string());
            claimed.push(slot);
        }
    }
    Ok(Some(claimed))
}

pub fn release(conn: &Connection, slot_id: &str) -> Result<bool, AppError> {
    Ok(queries::release_time_slot(conn, slot_id)?)
}

/// Frees each slot, skipping ids that no longer exist.
pub fn release_all(conn: &Connection, slot_ids: &[String]) -> Result<usize, AppError> {
    let mut released = 0;
    for slot_id in slot_ids {
        if release(conn, slot_id)? {
            released += 1;
        } else {
            tracing::warn!(slot_id = %slot_id, "release skipped, slot no longer exists");
        }
    }
    Ok(released)
}

fn normalize_batch(slots: &[NewTimeSlot]) -> Result<Vec<NewTimeSlot>, AppError> {
    let normalized = slots
        .iter()
        .map(|s| s.normalized().map_err(|e| AppError::Validation(e.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    for (i, a) in normalized.iter().enumerate() {
        if normalized[i + 1..].iter().any(|b| a.overlaps(b)) {
            return Err(AppError::Validation(format!(
                "Timeslots overlap on {} at {}-{}",
                a.date, a.start_time, a.end_time
            )));
        }
    }
    Ok(normalized)
}

fn conflicts_with_existing(
    conn: &Connection,
    ground_id: &str,
    slot: &NewTimeSlot,
) -> Result<bool, AppError> {
    let existing = queries::get_slots_on_date(conn, ground_id, Some(slot.date))?;
    Ok(existing
        .iter()
        .any(|e| e.overlaps(slot.date, &slot.start_time, &slot.end_time)))
}

/// Creates the ground's slot document when missing and appends `slots` to it.
pub fn create_slots(
    conn: &mut Connection,
    ground_id: &str,
    slots: &[NewTimeSlot],
) -> Result<Vec<TimeSlot>, AppError> {
    if slots.is_empty() {
        return Err(AppError::Validation("At least one timeslot is required".to_string()));
    }
    if queries::get_ground(conn, ground_id)?.is_none() {
        return Err(AppError::NotFound("Ground not found".to_string()));
    }
    let batch = normalize_batch(slots)?;

    let tx = conn.transaction()?;
    for slot in &batch {
        if conflicts_with_existing(&tx, ground_id, slot)? {
            return Err(AppError::Rejected(
                "Timeslot conflicts with existing timeslots".to_string(),
            ));
        }
    }
    queries::ensure_slot_document(&tx, ground_id)?;
    let created = queries::insert_time_slots(&tx, ground_id, &batch)?;
    tx.commit()?;

    tracing::info!(ground_id = %ground_id, count = created.len(), "timeslots created");
    Ok(created)
}

/// Appends one slot to an existing slot document.
pub fn add_slot(conn: &mut Connection, ground_id: &str, slot: &NewTimeSlot) -> Result<TimeSlot, AppError> {
    let slot = slot
        .normalized()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let tx = conn.transaction()?;
    if !queries::slot_document_exists(&tx, ground_id)? {
        return Err(AppError::NotFound("Slot not found".to_string()));
    }
    if conflicts_with_existing(&tx, ground_id, &slot)? {
        return Err(AppError::Rejected(
            "Timeslot conflicts with existing timeslots".to_string(),
        ));
    }
    queries::ensure_slot_document(&tx, ground_id)?;
    let mut created = queries::insert_time_slots(&tx, ground_id, std::slice::from_ref(&slot))?;
    tx.commit()?;

    created
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("slot insert returned nothing")))
}

/// Administrative removal. Held slots stay put so no booking loses its slot.
pub fn delete_slot(conn: &Connection, ground_id: &str, slot_id: &str) -> Result<(), AppError> {
    let slot = queries::get_time_slot(conn, slot_id)?
        .filter(|s| s.ground_id == ground_id)
        .ok_or_else(|| AppError::NotFound("Slot not found or no changes made".to_string()))?;

    if !slot.is_free() {
        return Err(AppError::Conflict("Booked slots cannot be deleted".to_string()));
    }

    queries::delete_time_slot(conn, ground_id, slot_id)?;
    tracing::info!(slot_id = %slot_id, ground_id = %ground_id, "timeslot deleted");
    Ok(())
}

pub fn slots_by_date(
    conn: &Connection,
    ground_id: &str,
    date: Option<NaiveDate>,
) -> Result<SlotDocument, AppError> {
    if !queries::slot_document_exists(conn, ground_id)? {
        return Err(AppError::NotFound("No slots found".to_string()));
    }
    Ok(SlotDocument {
        ground_id: ground_id.to_string(),
        timeslots: queries::get_slots_on_date(conn, ground_id, date)?,
    })
}

pub fn upcoming_slots(conn: &Connection, ground_id: &str, today: NaiveDate) -> Result<Vec<TimeSlot>, AppError> {
    let until = today + Duration::days(UPCOMING_WINDOW_DAYS);
    let slots = queries::get_slots_between(conn, ground_id, today, until)?;
    if slots.is_empty() {
        return Err(AppError::NotFound(
            "No slots available for the next 30 days".to_string(),
        ));
    }
    Ok(slots)
}
