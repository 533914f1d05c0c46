use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use thiserror::Error;

use super::types::DayOfWeek;

/// Rejected "HH:MM" input
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid time format '{0}', expected HH:MM")]
pub struct InvalidFormat(pub String);

/// Half-open overlap test: touching boundaries do not overlap
pub fn windows_overlap<T: PartialOrd>(a_start: T, a_end: T, b_start: T, b_end: T) -> bool {
    a_start < b_end && a_end > b_start
}

/// Weekday of a calendar date. Weekly availability rows are keyed by the
/// UTC calendar day, so the date is never shifted into a local timezone.
pub fn day_of_week(date: NaiveDate) -> DayOfWeek {
    DayOfWeek::from(date.weekday())
}

/// Parses a zero-padded "HH:MM" string to minutes since midnight
pub fn time_string_to_minutes(time_str: &str) -> Result<u32, InvalidFormat> {
    let bytes = time_str.as_bytes();
    let well_formed = bytes.len() == 5
        && bytes[2] == b':'
        && [0, 1, 3, 4].iter().all(|&i| bytes[i].is_ascii_digit());
    if !well_formed {
        return Err(InvalidFormat(time_str.to_string()));
    }

    let hours = u32::from(bytes[0] - b'0') * 10 + u32::from(bytes[1] - b'0');
    let minutes = u32::from(bytes[3] - b'0') * 10 + u32::from(bytes[4] - b'0');
    if hours >= 24 || minutes >= 60 {
        return Err(InvalidFormat(time_str.to_string()));
    }
    Ok(hours * 60 + minutes)
}

/// Formats minutes since midnight as "HH:MM". 1440 renders as "24:00" so a
/// slot closing at midnight still compares after every same-day start.
pub fn minutes_to_time_string(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// 12-hour label: 540 -> "9am", 630 -> "10:30am", 720 -> "12pm"
pub fn hour_label(minutes: u32) -> String {
    let hours = (minutes / 60) % 24;
    let mins = minutes % 60;
    let suffix = if hours < 12 { "am" } else { "pm" };
    let display_hour = match hours % 12 {
        0 => 12,
        h => h,
    };
    if mins == 0 {
        format!("{}{}", display_hour, suffix)
    } else {
        format!("{}:{:02}{}", display_hour, mins, suffix)
    }
}

/// "9am-10am" style range label
pub fn slot_label(start_minutes: u32, end_minutes: u32) -> String {
    format!("{}-{}", hour_label(start_minutes), hour_label(end_minutes))
}

pub fn add_minutes(instant: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    instant + Duration::minutes(minutes)
}
