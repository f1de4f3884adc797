//! Bookable slot grid: date-key / time-label formats and the 7-day
//! availability calculator.
//!
//! Slots are 30 minutes long, from 10:00 until 21:00, for today and the
//! following six days. A slot is identified by its date-key (`D_M_YYYY`,
//! unpadded) and its time label (`H:MM AM/PM`).

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;

use crate::models::SlotsBooked;

pub const OPENING_HOUR: u32 = 10;
pub const CLOSING_HOUR: u32 = 21;
pub const SLOT_MINUTES: u32 = 30;
pub const BOOKING_WINDOW_DAYS: i64 = 7;

/// `5_3_2025` for 5 March 2025.
pub fn date_key(date: NaiveDate) -> String {
    format!("{}_{}_{}", date.day(), date.month(), date.year())
}

/// `10:00 AM`, `1:30 PM`.
pub fn time_label(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    let mut parts = key.trim().split('_');
    let day = parts.next()?.parse::<u32>().ok()?;
    let month = parts.next()?.parse::<u32>().ok()?;
    let year = parts.next()?.parse::<i32>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Accepts `3:30 PM`, `03:30 pm` and `3:30PM`.
pub fn parse_time_label(label: &str) -> Option<NaiveTime> {
    let label = label.trim().to_ascii_uppercase();
    let (clock, pm) = if let Some(rest) = label.strip_suffix("PM") {
        (rest.trim_end(), true)
    } else if let Some(rest) = label.strip_suffix("AM") {
        (rest.trim_end(), false)
    } else {
        return None;
    };

    let (hour, minute) = clock.split_once(':')?;
    if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
        return None;
    }
    let hour = hour.parse::<u32>().ok()?;
    let minute = minute.parse::<u32>().ok()?;
    if !(1..=12).contains(&hour) {
        return None;
    }

    let hour24 = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };
    NaiveTime::from_hms_opt(hour24, minute, 0)
}

/// True when `time` starts one of the daily slots.
pub fn on_grid(time: NaiveTime) -> bool {
    time.second() == 0
        && time.minute() % SLOT_MINUTES == 0
        && time.hour() >= OPENING_HOUR
        && time.hour() < CLOSING_HOUR
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    BadDate,
    BadTime,
    OffGrid,
}

/// Parses a client supplied slot and re-renders it in canonical form, so
/// `03:30 pm` and `3:30 PM` name the same slot.
pub fn canonical_slot(slot_date: &str, slot_time: &str) -> Result<(String, String), SlotError> {
    let date = parse_date_key(slot_date).ok_or(SlotError::BadDate)?;
    let time = parse_time_label(slot_time).ok_or(SlotError::BadTime)?;
    if !on_grid(time) {
        return Err(SlotError::OffGrid);
    }
    Ok((date_key(date), time_label(time)))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotCandidate {
    pub datetime: NaiveDateTime,
    pub time: String,
}

/// Free slots of one day, generated lazily. Cloning restarts the sequence.
#[derive(Debug, Clone)]
pub struct DaySlots<'a> {
    date: NaiveDate,
    cursor: NaiveDateTime,
    end: NaiveDateTime,
    taken: &'a [String],
}

impl DaySlots<'_> {
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn date_key(&self) -> String {
        date_key(self.date)
    }
}

impl Iterator for DaySlots<'_> {
    type Item = SlotCandidate;

    fn next(&mut self) -> Option<SlotCandidate> {
        while self.cursor < self.end {
            let current = self.cursor;
            self.cursor += Duration::minutes(SLOT_MINUTES as i64);

            let label = time_label(current.time());
            if self.taken.iter().any(|t| *t == label) {
                continue;
            }
            return Some(SlotCandidate {
                datetime: current,
                time: label,
            });
        }
        None
    }
}

fn at(date: NaiveDate, hour: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::default()) + Duration::hours(hour as i64)
}

/// First slot of today: one hour from now, floored to the half hour, but
/// never before opening.
fn first_start_today(now: NaiveDateTime) -> NaiveDateTime {
    let ahead = now + Duration::hours(1);
    let minute = if ahead.minute() >= 30 { 30 } else { 0 };
    let floored = ahead.date().and_time(NaiveTime::default())
        + Duration::hours(ahead.hour() as i64)
        + Duration::minutes(minute);
    floored.max(at(now.date(), OPENING_HOUR))
}

/// Free slots for the next seven days starting at `now`, one entry per day
/// offset. Days without free slots are still present, just empty.
pub fn available_slots(now: NaiveDateTime, booked: &SlotsBooked) -> Vec<DaySlots<'_>> {
    (0..BOOKING_WINDOW_DAYS)
        .map(|offset| {
            let date = now.date() + Duration::days(offset);
            let start = if offset == 0 {
                first_start_today(now)
            } else {
                at(date, OPENING_HOUR)
            };
            let taken = booked
                .get(&date_key(date))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            DaySlots {
                date,
                cursor: start,
                end: at(date, CLOSING_HOUR),
                taken,
            }
        })
        .collect()
}
