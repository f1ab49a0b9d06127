use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A bookable interval embedded in its ground's slot document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: String,
    pub ground_id: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub amount: Option<Decimal>,
    pub is_booked: bool,
    pub booked_by: Option<String>,
}

impl TimeSlot {
    /// Per-slot price, or the ground's hourly rate when the slot has none.
    pub fn price_or(&self, fallback: Decimal) -> Decimal {
        self.amount.unwrap_or(fallback)
    }

    pub fn is_free(&self) -> bool {
        !self.is_booked && self.booked_by.is_none()
    }

    pub fn overlaps(&self, date: NaiveDate, start_time: &str, end_time: &str) -> bool {
        self.date == date && start_time < self.end_time.as_str() && end_time > self.start_time.as_str()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotDocument {
    pub ground_id: String,
    pub timeslots: Vec<TimeSlot>,
}

/// Input for slot generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTimeSlot {
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub amount: Option<Decimal>,
}

impl NewTimeSlot {
    /// Validates the time range and returns a copy with `HH:MM` zero-padded times.
    pub fn normalized(&self) -> anyhow::Result<Self> {
        let start_time = normalize_time(&self.start_time)?;
        let end_time = normalize_time(&self.end_time)?;
        if start_time >= end_time {
            anyhow::bail!("start time {start_time} must be before end time {end_time}");
        }
        if let Some(amount) = self.amount {
            if amount.is_sign_negative() {
                anyhow::bail!("slot amount cannot be negative");
            }
        }
        Ok(Self {
            date: self.date,
            start_time,
            end_time,
            amount: self.amount,
        })
    }

    pub fn overlaps(&self, other: &NewTimeSlot) -> bool {
        self.date == other.date
            && self.start_time < other.end_time
            && self.end_time > other.start_time
    }
}

pub fn normalize_time(s: &str) -> anyhow::Result<String> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.len() != 2 {
        return Err(anyhow::anyhow!("invalid time format: {s}"));
    }
    let hour: u32 = parts[0]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid hour in: {s}"))?;
    let minute: u32 = parts[1]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid minute in: {s}"))?;
    if hour > 23 || minute > 59 {
        return Err(anyhow::anyhow!("time out of range: {s}"));
    }
    Ok(format!("{hour:02}:{minute:02}"))
}
