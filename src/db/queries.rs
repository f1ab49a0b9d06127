use std::str::FromStr;

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{
    Booking, BookingMeta, BookingStatus, Coupon, CouponStatus, CouponType, Ground, GroundStatus,
    NewTimeSlot, PaymentStatus, Role, TimeSlot, User,
};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

fn format_ts(dt: &NaiveDateTime) -> String {
    dt.format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).with_context(|| format!("invalid timestamp: {s}"))
}

fn parse_amount(s: &str) -> anyhow::Result<Decimal> {
    Decimal::from_str(s).with_context(|| format!("invalid amount: {s}"))
}

fn parse_optional_amount(s: Option<String>) -> anyhow::Result<Option<Decimal>> {
    s.as_deref().map(parse_amount).transpose()
}

/// `?{start}, ?{start+1}, ...` for an `IN (...)` list of `count` values.
fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Users ──

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let result = conn
        .query_row(
            "SELECT id, first_name, last_name, email, phone_number, role, created_at
             FROM users WHERE id = ?1",
            params![id],
            |row| Ok(parse_user_row(row)),
        )
        .optional()?;

    result.transpose()
}

pub fn save_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, first_name, last_name, email, phone_number, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
           first_name = excluded.first_name,
           last_name = excluded.last_name,
           email = excluded.email,
           phone_number = excluded.phone_number,
           role = excluded.role",
        params![
            user.id,
            user.first_name,
            user.last_name,
            user.email,
            user.phone_number,
            user.role.as_str(),
            format_ts(&user.created_at),
        ],
    )?;
    Ok(())
}

fn parse_user_row(row: &rusqlite::Row) -> anyhow::Result<User> {
    let role_str: String = row.get(5)?;
    let created_at_str: String = row.get(6)?;

    Ok(User {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        phone_number: row.get(4)?,
        role: Role::parse(&role_str).with_context(|| format!("unknown role: {role_str}"))?,
        created_at: parse_ts(&created_at_str)?,
    })
}

// ── Grounds ──

pub fn get_ground(conn: &Connection, id: &str) -> anyhow::Result<Option<Ground>> {
    let result = conn
        .query_row(
            "SELECT id, owner_id, name, address, price_per_hour, status, created_at
             FROM grounds WHERE id = ?1",
            params![id],
            |row| Ok(parse_ground_row(row)),
        )
        .optional()?;

    result.transpose()
}

pub fn find_active_ground(conn: &Connection, id: &str) -> anyhow::Result<Option<Ground>> {
    Ok(get_ground(conn, id)?.filter(|g| g.status == GroundStatus::Active))
}

pub fn save_ground(conn: &Connection, ground: &Ground) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO grounds (id, owner_id, name, address, price_per_hour, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
           owner_id = excluded.owner_id,
           name = excluded.name,
           address = excluded.address,
           price_per_hour = excluded.price_per_hour,
           status = excluded.status",
        params![
            ground.id,
            ground.owner_id,
            ground.name,
            ground.address,
            ground.price_per_hour.to_string(),
            ground.status.as_str(),
            format_ts(&ground.created_at),
        ],
    )?;
    Ok(())
}

fn parse_ground_row(row: &rusqlite::Row) -> anyhow::Result<Ground> {
    let price_str: String = row.get(4)?;
    let status_str: String = row.get(5)?;
    let created_at_str: String = row.get(6)?;

    Ok(Ground {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        address: row.get(3)?,
        price_per_hour: parse_amount(&price_str)?,
        status: GroundStatus::parse(&status_str),
        created_at: parse_ts(&created_at_str)?,
    })
}

// ── Slot Documents ──

const SLOT_COLUMNS: &str =
    "id, ground_id, slot_date, start_time, end_time, amount, is_booked, booked_by";

pub fn slot_document_exists(conn: &Connection, ground_id: &str) -> anyhow::Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM slot_documents WHERE ground_id = ?1",
        params![ground_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn ensure_slot_document(conn: &Connection, ground_id: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO slot_documents (ground_id) VALUES (?1)
         ON CONFLICT(ground_id) DO UPDATE SET updated_at = datetime('now')",
        params![ground_id],
    )?;
    Ok(())
}

/// Appends slots to the ground's document; the document must already exist.
pub fn insert_time_slots(
    conn: &Connection,
    ground_id: &str,
    slots: &[NewTimeSlot],
) -> anyhow::Result<Vec<TimeSlot>> {
    let mut stmt = conn.prepare(
        "INSERT INTO time_slots (id, ground_id, slot_date, start_time, end_time, amount, is_booked, booked_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL)",
    )?;

    let mut created = Vec::with_capacity(slots.len());
    for slot in slots {
        let id = uuid::Uuid::new_v4().to_string();
        stmt.execute(params![
            id,
            ground_id,
            slot.date.format(DATE_FORMAT).to_string(),
            slot.start_time,
            slot.end_time,
            slot.amount.map(|a| a.to_string()),
        ])?;
        created.push(TimeSlot {
            id,
            ground_id: ground_id.to_string(),
            date: slot.date,
            start_time: slot.start_time.clone(),
            end_time: slot.end_time.clone(),
            amount: slot.amount,
            is_booked: false,
            booked_by: None,
        });
    }
    Ok(created)
}

/// All slots of a ground in document order, optionally restricted to one date.
pub fn get_slots_on_date(
    conn: &Connection,
    ground_id: &str,
    date: Option<NaiveDate>,
) -> anyhow::Result<Vec<TimeSlot>> {
    let (sql, params_vec): (String, Vec<String>) = match date {
        Some(d) => (
            format!(
                "SELECT {SLOT_COLUMNS} FROM time_slots WHERE ground_id = ?1 AND slot_date = ?2 ORDER BY rowid"
            ),
            vec![ground_id.to_string(), d.format(DATE_FORMAT).to_string()],
        ),
        None => (
            format!("SELECT {SLOT_COLUMNS} FROM time_slots WHERE ground_id = ?1 ORDER BY rowid"),
            vec![ground_id.to_string()],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params_vec.iter()), |row| {
        Ok(parse_slot_row(row))
    })?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row??);
    }
    Ok(slots)
}

pub fn get_slots_between(
    conn: &Connection,
    ground_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> anyhow::Result<Vec<TimeSlot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SLOT_COLUMNS} FROM time_slots
         WHERE ground_id = ?1 AND slot_date >= ?2 AND slot_date <= ?3
         ORDER BY slot_date ASC, start_time ASC"
    ))?;

    let rows = stmt.query_map(
        params![
            ground_id,
            from.format(DATE_FORMAT).to_string(),
            to.format(DATE_FORMAT).to_string()
        ],
        |row| Ok(parse_slot_row(row)),
    )?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row??);
    }
    Ok(slots)
}

/// Current state of the given slots of a ground, regardless of booking state, in
/// the order the ids were given. Unknown ids are skipped.
pub fn get_slots_by_ids(
    conn: &Connection,
    ground_id: &str,
    slot_ids: &[String],
) -> anyhow::Result<Vec<TimeSlot>> {
    let found = select_slots(conn, ground_id, slot_ids, false)?;
    Ok(slot_ids
        .iter()
        .filter_map(|id| found.iter().find(|s| &s.id == id).cloned())
        .collect())
}

/// The subset of `slot_ids` belonging to `ground_id` that nobody holds.
pub fn query_available_slots(
    conn: &Connection,
    ground_id: &str,
    slot_ids: &[String],
) -> anyhow::Result<Vec<TimeSlot>> {
    select_slots(conn, ground_id, slot_ids, true)
}

fn select_slots(
    conn: &Connection,
    ground_id: &str,
    slot_ids: &[String],
    only_free: bool,
) -> anyhow::Result<Vec<TimeSlot>> {
    if slot_ids.is_empty() {
        return Ok(vec![]);
    }

    let free_filter = if only_free {
        " AND is_booked = 0 AND booked_by IS NULL"
    } else {
        ""
    };
    let sql = format!(
        "SELECT {SLOT_COLUMNS} FROM time_slots WHERE ground_id = ?1{free_filter} AND id IN ({}) ORDER BY rowid",
        placeholders(2, slot_ids.len())
    );

    let mut values: Vec<&str> = Vec::with_capacity(slot_ids.len() + 1);
    values.push(ground_id);
    values.extend(slot_ids.iter().map(String::as_str));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), |row| Ok(parse_slot_row(row)))?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row??);
    }
    Ok(slots)
}

pub fn get_time_slot(conn: &Connection, slot_id: &str) -> anyhow::Result<Option<TimeSlot>> {
    let result = conn
        .query_row(
            &format!("SELECT {SLOT_COLUMNS} FROM time_slots WHERE id = ?1"),
            params![slot_id],
            |row| Ok(parse_slot_row(row)),
        )
        .optional()?;

    result.transpose()
}

/// Marks one slot as held by `user_id`, only if it is still free. Returns whether
/// this call won the slot.
pub fn claim_time_slot(
    conn: &Connection,
    ground_id: &str,
    slot_id: &str,
    user_id: &str,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE time_slots SET is_booked = 1, booked_by = ?1
         WHERE id = ?2 AND ground_id = ?3 AND is_booked = 0 AND booked_by IS NULL",
        params![user_id, slot_id, ground_id],
    )?;
    Ok(count == 1)
}

pub fn release_time_slot(conn: &Connection, slot_id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE time_slots SET is_booked = 0, booked_by = NULL WHERE id = ?1",
        params![slot_id],
    )?;
    Ok(count > 0)
}

pub fn delete_time_slot(conn: &Connection, ground_id: &str, slot_id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM time_slots WHERE id = ?1 AND ground_id = ?2",
        params![slot_id, ground_id],
    )?;
    Ok(count > 0)
}

fn parse_slot_row(row: &rusqlite::Row) -> anyhow::Result<TimeSlot> {
    let date_str: String = row.get(2)?;
    let amount: Option<String> = row.get(5)?;

    Ok(TimeSlot {
        id: row.get(0)?,
        ground_id: row.get(1)?,
        date: NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
            .with_context(|| format!("invalid slot date: {date_str}"))?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        amount: parse_optional_amount(amount)?,
        is_booked: row.get::<_, i32>(6)? != 0,
        booked_by: row.get(7)?,
    })
}

// ── Coupons ──

const COUPON_COLUMNS: &str = "id, code, title, description, kind, discount_value, min_booking_amount, \
     max_discount_amount, start_date, end_date, status, is_public, created_at";

pub fn insert_coupon(conn: &Connection, coupon: &Coupon) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO coupons (id, code, title, description, kind, discount_value, min_booking_amount,
                              max_discount_amount, start_date, end_date, status, is_public, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            coupon.id,
            coupon.code,
            coupon.title,
            coupon.description,
            coupon.kind.as_str(),
            coupon.discount_value.to_string(),
            coupon.min_booking_amount.map(|a| a.to_string()),
            coupon.max_discount_amount.map(|a| a.to_string()),
            format_ts(&coupon.start_date),
            format_ts(&coupon.end_date),
            coupon.status.as_str(),
            coupon.is_public as i32,
            format_ts(&coupon.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_coupon_by_code(conn: &Connection, code: &str) -> anyhow::Result<Option<Coupon>> {
    let result = conn
        .query_row(
            &format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = ?1"),
            params![code],
            |row| Ok(parse_coupon_row(row)),
        )
        .optional()?;

    result.transpose()
}

pub fn list_coupons(conn: &Connection, public_active_only: bool) -> anyhow::Result<Vec<Coupon>> {
    let sql = if public_active_only {
        format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE status = 'active' AND is_public = 1 ORDER BY created_at DESC"
        )
    } else {
        format!("SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at DESC")
    };

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| Ok(parse_coupon_row(row)))?;

    let mut coupons = vec![];
    for row in rows {
        coupons.push(row??);
    }
    Ok(coupons)
}

fn parse_coupon_row(row: &rusqlite::Row) -> anyhow::Result<Coupon> {
    let kind_str: String = row.get(4)?;
    let discount_value: String = row.get(5)?;
    let min_booking_amount: Option<String> = row.get(6)?;
    let max_discount_amount: Option<String> = row.get(7)?;
    let start_date: String = row.get(8)?;
    let end_date: String = row.get(9)?;
    let status_str: String = row.get(10)?;
    let created_at: String = row.get(12)?;

    Ok(Coupon {
        id: row.get(0)?,
        code: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        kind: CouponType::parse(&kind_str),
        discount_value: parse_amount(&discount_value)?,
        min_booking_amount: parse_optional_amount(min_booking_amount)?,
        max_discount_amount: parse_optional_amount(max_discount_amount)?,
        start_date: parse_ts(&start_date)?,
        end_date: parse_ts(&end_date)?,
        status: CouponStatus::parse(&status_str),
        is_public: row.get::<_, i32>(11)? != 0,
        created_at: parse_ts(&created_at)?,
    })
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "b.id, b.user_id, b.ground_id, b.slots, b.total_amount, b.discount_amount, \
     b.final_amount, b.number_of_guests, b.coupon_id, b.status, b.payment_status, b.payment_id, \
     b.payment_details, b.meta, b.cancellation_reason, b.cancelled_at, b.rescheduled, b.created_at, \
     b.updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, user_id, ground_id, slots, total_amount, discount_amount, final_amount,
                               number_of_guests, coupon_id, status, payment_status, payment_id,
                               payment_details, meta, cancellation_reason, cancelled_at, rescheduled,
                               created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        params![
            booking.id,
            booking.user_id,
            booking.ground_id,
            serde_json::to_string(&booking.slots)?,
            booking.total_amount.to_string(),
            booking.discount_amount.to_string(),
            booking.final_amount.to_string(),
            booking.number_of_guests,
            booking.coupon_id,
            booking.status.as_str(),
            booking.payment_status.as_str(),
            booking.payment_id,
            booking.payment_details.as_ref().map(serde_json::to_string).transpose()?,
            booking.meta.as_ref().map(serde_json::to_string).transpose()?,
            booking.cancellation_reason,
            booking.cancelled_at.as_ref().map(format_ts),
            booking.rescheduled as i32,
            format_ts(&booking.created_at),
            format_ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

/// Overwrites every mutable column of an existing booking.
pub fn update_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET
           slots = ?1, total_amount = ?2, discount_amount = ?3, final_amount = ?4,
           number_of_guests = ?5, coupon_id = ?6, status = ?7, payment_status = ?8,
           payment_id = ?9, payment_details = ?10, meta = ?11, cancellation_reason = ?12,
           cancelled_at = ?13, rescheduled = ?14, updated_at = ?15
         WHERE id = ?16",
        params![
            serde_json::to_string(&booking.slots)?,
            booking.total_amount.to_string(),
            booking.discount_amount.to_string(),
            booking.final_amount.to_string(),
            booking.number_of_guests,
            booking.coupon_id,
            booking.status.as_str(),
            booking.payment_status.as_str(),
            booking.payment_id,
            booking.payment_details.as_ref().map(serde_json::to_string).transpose()?,
            booking.meta.as_ref().map(serde_json::to_string).transpose()?,
            booking.cancellation_reason,
            booking.cancelled_at.as_ref().map(format_ts),
            booking.rescheduled as i32,
            format_ts(&booking.updated_at),
            booking.id,
        ],
    )?;
    Ok(count > 0)
}

/// Records a successful payment unless one was already recorded. Returns false when
/// the booking was already paid (or does not exist).
pub fn record_booking_payment(conn: &Connection, booking: &Booking) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET
           meta = ?1, payment_details = ?2, payment_status = ?3, status = ?4, updated_at = ?5
         WHERE id = ?6 AND payment_status != 'paid'",
        params![
            booking.meta.as_ref().map(serde_json::to_string).transpose()?,
            booking.payment_details.as_ref().map(serde_json::to_string).transpose()?,
            booking.payment_status.as_str(),
            booking.status.as_str(),
            format_ts(&booking.updated_at),
            booking.id,
        ],
    )?;
    Ok(count == 1)
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = ?1"),
            params![id],
            |row| Ok(parse_booking_row(row)),
        )
        .optional()?;

    result.transpose()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBooking {
    #[serde(flatten)]
    pub booking: Booking,
    pub ground_name: Option<String>,
    pub ground_address: Option<String>,
}

pub fn get_bookings_for_user(conn: &Connection, user_id: &str) -> anyhow::Result<Vec<UserBooking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS}, g.name, g.address
         FROM bookings b
         LEFT JOIN grounds g ON g.id = b.ground_id
         WHERE b.user_id = ?1
         ORDER BY b.created_at DESC, b.rowid DESC"
    ))?;

    let rows = stmt.query_map(params![user_id], |row| {
        Ok(parse_booking_row(row).and_then(|booking| {
            Ok(UserBooking {
                booking,
                ground_name: row.get(19)?,
                ground_address: row.get(20)?,
            })
        }))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminBookingRow {
    pub id: String,
    pub total_amount: Decimal,
    pub final_amount: Decimal,
    pub number_of_guests: i32,
    pub rescheduled: bool,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub user_email: Option<String>,
    pub user_first_name: String,
    pub user_last_name: String,
    pub user_phone_number: Option<String>,
    pub ground_name: String,
    pub ground_address: Option<String>,
    pub ground_owner_name: String,
    pub ground_owner_email: Option<String>,
    pub ground_owner_mobile: Option<String>,
}

pub fn get_all_bookings(
    conn: &Connection,
    status_filter: Option<BookingStatus>,
    limit: i64,
) -> anyhow::Result<Vec<AdminBookingRow>> {
    let base = "SELECT b.id, b.total_amount, b.final_amount, b.number_of_guests, b.rescheduled, b.status,
                b.payment_status, b.created_at, b.updated_at,
                u.email, u.first_name, u.last_name, u.phone_number,
                g.name, g.address,
                o.first_name || ' ' || o.last_name, o.email, o.phone_number
         FROM bookings b
         JOIN users u ON u.id = b.user_id
         JOIN grounds g ON g.id = b.ground_id
         JOIN users o ON o.id = g.owner_id";

    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            format!("{base} WHERE b.status = ?1 ORDER BY b.created_at DESC LIMIT ?2"),
            vec![
                Box::new(status.as_str()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
        None => (
            format!("{base} ORDER BY b.created_at DESC LIMIT ?1"),
            vec![Box::new(limit) as Box<dyn rusqlite::types::ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        Ok(parse_admin_booking_row(row))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

fn parse_admin_booking_row(row: &rusqlite::Row) -> anyhow::Result<AdminBookingRow> {
    let total_amount: String = row.get(1)?;
    let final_amount: String = row.get(2)?;
    let status: String = row.get(5)?;
    let payment_status: String = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    let owner_name: String = row.get(15)?;

    Ok(AdminBookingRow {
        id: row.get(0)?,
        total_amount: parse_amount(&total_amount)?,
        final_amount: parse_amount(&final_amount)?,
        number_of_guests: row.get(3)?,
        rescheduled: row.get::<_, i32>(4)? != 0,
        status: BookingStatus::parse(&status),
        payment_status: PaymentStatus::parse(&payment_status),
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
        user_email: row.get(9)?,
        user_first_name: row.get(10)?,
        user_last_name: row.get(11)?,
        user_phone_number: row.get(12)?,
        ground_name: row.get(13)?,
        ground_address: row.get(14)?,
        ground_owner_name: owner_name.trim().to_string(),
        ground_owner_email: row.get(16)?,
        ground_owner_mobile: row.get(17)?,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRow {
    pub id: String,
    pub payment_status: PaymentStatus,
    pub status: BookingStatus,
    pub total_amount: Decimal,
    pub final_amount: Decimal,
    pub payment_id: Option<String>,
    pub payment_details: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub user_name: String,
    pub user_email: Option<String>,
    pub ground_name: String,
    pub ground_owner_name: String,
    pub ground_owner_email: Option<String>,
    pub ground_owner_mobile: Option<String>,
}

pub fn get_transactions(conn: &Connection, limit: i64) -> anyhow::Result<Vec<TransactionRow>> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.payment_status, b.status, b.total_amount, b.final_amount, b.payment_id,
                b.payment_details, b.created_at, b.updated_at,
                u.first_name || ' ' || u.last_name, u.email,
                g.name,
                o.first_name || ' ' || o.last_name, o.email, o.phone_number
         FROM bookings b
         JOIN users u ON u.id = b.user_id
         JOIN grounds g ON g.id = b.ground_id
         JOIN users o ON o.id = g.owner_id
         ORDER BY b.created_at DESC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit], |row| Ok(parse_transaction_row(row)))?;

    let mut transactions = vec![];
    for row in rows {
        transactions.push(row??);
    }
    Ok(transactions)
}

fn parse_transaction_row(row: &rusqlite::Row) -> anyhow::Result<TransactionRow> {
    let payment_status: String = row.get(1)?;
    let status: String = row.get(2)?;
    let total_amount: String = row.get(3)?;
    let final_amount: String = row.get(4)?;
    let payment_details: Option<String> = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    let user_name: String = row.get(9)?;
    let owner_name: String = row.get(12)?;

    Ok(TransactionRow {
        id: row.get(0)?,
        payment_status: PaymentStatus::parse(&payment_status),
        status: BookingStatus::parse(&status),
        total_amount: parse_amount(&total_amount)?,
        final_amount: parse_amount(&final_amount)?,
        payment_id: row.get(5)?,
        payment_details: payment_details
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
        user_name: user_name.trim().to_string(),
        user_email: row.get(10)?,
        ground_name: row.get(11)?,
        ground_owner_name: owner_name.trim().to_string(),
        ground_owner_email: row.get(13)?,
        ground_owner_mobile: row.get(14)?,
    })
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let slots_json: String = row.get(3)?;
    let total_amount: String = row.get(4)?;
    let discount_amount: String = row.get(5)?;
    let final_amount: String = row.get(6)?;
    let status_str: String = row.get(9)?;
    let payment_status_str: String = row.get(10)?;
    let payment_details: Option<String> = row.get(12)?;
    let meta: Option<String> = row.get(13)?;
    let cancelled_at: Option<String> = row.get(15)?;
    let created_at_str: String = row.get(17)?;
    let updated_at_str: String = row.get(18)?;

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        ground_id: row.get(2)?,
        slots: serde_json::from_str(&slots_json).context("invalid booking slot list")?,
        total_amount: parse_amount(&total_amount)?,
        discount_amount: parse_amount(&discount_amount)?,
        final_amount: parse_amount(&final_amount)?,
        number_of_guests: row.get(7)?,
        coupon_id: row.get(8)?,
        status: BookingStatus::parse(&status_str),
        payment_status: PaymentStatus::parse(&payment_status_str),
        payment_id: row.get(11)?,
        payment_details: payment_details
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .context("invalid payment details")?,
        meta: meta
            .as_deref()
            .map(serde_json::from_str::<BookingMeta>)
            .transpose()
            .context("invalid booking meta")?,
        cancellation_reason: row.get(14)?,
        cancelled_at: cancelled_at.as_deref().map(parse_ts).transpose()?,
        rescheduled: row.get::<_, i32>(16)? != 0,
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use rust_decimal_macros::dec;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TS_FORMAT).unwrap()
    }

    fn seed(conn: &Connection) -> Vec<TimeSlot> {
        let now = ts("2025-06-01 09:00:00");
        save_user(
            conn,
            &User {
                id: "owner".into(),
                first_name: "Olga".into(),
                last_name: "Owner".into(),
                email: None,
                phone_number: None,
                role: Role::Ground,
                created_at: now,
            },
        )
        .unwrap();
        save_user(
            conn,
            &User {
                id: "u1".into(),
                first_name: "Ula".into(),
                last_name: "User".into(),
                email: None,
                phone_number: None,
                role: Role::User,
                created_at: now,
            },
        )
        .unwrap();
        save_ground(
            conn,
            &Ground {
                id: "g1".into(),
                owner_id: "owner".into(),
                name: "Pitch One".into(),
                address: None,
                price_per_hour: dec!(100),
                status: GroundStatus::Active,
                created_at: now,
            },
        )
        .unwrap();
        ensure_slot_document(conn, "g1").unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
        insert_time_slots(
            conn,
            "g1",
            &[
                NewTimeSlot {
                    date,
                    start_time: "10:00".into(),
                    end_time: "11:00".into(),
                    amount: None,
                },
                NewTimeSlot {
                    date,
                    start_time: "11:00".into(),
                    end_time: "12:00".into(),
                    amount: Some(dec!(150)),
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_claim_is_conditional() {
        let conn = db::init_db(":memory:").unwrap();
        let slots = seed(&conn);

        assert!(claim_time_slot(&conn, "g1", &slots[0].id, "u1").unwrap());
        // Second claim on the same slot loses.
        assert!(!claim_time_slot(&conn, "g1", &slots[0].id, "owner").unwrap());
        // Wrong ground never matches.
        assert!(!claim_time_slot(&conn, "g2", &slots[1].id, "u1").unwrap());

        let held = get_time_slot(&conn, &slots[0].id).unwrap().unwrap();
        assert!(held.is_booked);
        assert_eq!(held.booked_by.as_deref(), Some("u1"));
    }

    #[test]
    fn test_query_available_excludes_held_and_foreign() {
        let conn = db::init_db(":memory:").unwrap();
        let slots = seed(&conn);
        claim_time_slot(&conn, "g1", &slots[0].id, "u1").unwrap();

        let ids = vec![slots[0].id.clone(), slots[1].id.clone(), "missing".to_string()];
        let available = query_available_slots(&conn, "g1", &ids).unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, slots[1].id);
        assert_eq!(available[0].amount, Some(dec!(150)));

        release_time_slot(&conn, &slots[0].id).unwrap();
        assert_eq!(query_available_slots(&conn, "g1", &ids).unwrap().len(), 2);
    }

    #[test]
    fn test_slots_by_ids_keep_request_order() {
        let conn = db::init_db(":memory:").unwrap();
        let slots = seed(&conn);
        let ids = vec![slots[1].id.clone(), slots[0].id.clone()];
        let found = get_slots_by_ids(&conn, "g1", &ids).unwrap();
        assert_eq!(found[0].id, slots[1].id);
        assert_eq!(found[1].id, slots[0].id);
    }

    #[test]
    fn test_booking_round_trip_and_payment_guard() {
        let conn = db::init_db(":memory:").unwrap();
        let slots = seed(&conn);
        let now = ts("2025-06-02 12:00:00");

        let mut booking = Booking::new_pending(
            "u1",
            "g1",
            slots.iter().map(|s| s.id.clone()).collect(),
            dec!(250),
            3,
            now,
        );
        insert_booking(&conn, &booking).unwrap();

        let loaded = get_booking_by_id(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(loaded.slots, booking.slots);
        assert_eq!(loaded.total_amount, dec!(250));
        assert_eq!(loaded.status, BookingStatus::Pending);

        booking.confirm(
            serde_json::json!({"txn": "abc"}),
            BookingMeta {
                user: None,
                ground: None,
                slots: vec![],
                captured_at: now,
            },
            now,
        );
        assert!(record_booking_payment(&conn, &booking).unwrap());
        assert!(!record_booking_payment(&conn, &booking).unwrap());

        let paid = get_booking_by_id(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.payment_details, Some(serde_json::json!({"txn": "abc"})));
    }

    #[test]
    fn test_admin_listing_joins_owner() {
        let conn = db::init_db(":memory:").unwrap();
        let slots = seed(&conn);
        let booking = Booking::new_pending(
            "u1",
            "g1",
            vec![slots[0].id.clone()],
            dec!(100),
            2,
            ts("2025-06-02 12:00:00"),
        );
        insert_booking(&conn, &booking).unwrap();

        let rows = get_all_bookings(&conn, None, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ground_owner_name, "Olga Owner");
        assert_eq!(rows[0].ground_name, "Pitch One");

        assert!(get_all_bookings(&conn, Some(BookingStatus::Cancelled), 10)
            .unwrap()
            .is_empty());
        assert_eq!(get_transactions(&conn, 10).unwrap()[0].user_name, "Ula User");
    }
}
