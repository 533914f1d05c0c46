use std::iter::FusedIterator;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use super::slot_utils::{minutes_to_time_string, slot_label};
use super::types::CandidateSlot;
use crate::config::BusinessHoursConfig;

/// Ordered candidate slots for one date. Consumed once; build a new one to
/// iterate again.
#[derive(Debug, Clone)]
pub struct BusinessHourSlots {
    date: NaiveDate,
    config: BusinessHoursConfig,
    next_hour: u32,
}

impl BusinessHourSlots {
    pub fn new(date: NaiveDate, config: BusinessHoursConfig) -> Self {
        Self {
            date,
            next_hour: config.start_hour,
            config,
        }
    }
}

impl Iterator for BusinessHourSlots {
    type Item = CandidateSlot;

    fn next(&mut self) -> Option<CandidateSlot> {
        let closing_minutes = self.config.end_hour * 60;
        while self.next_hour < self.config.end_hour {
            let hour = self.next_hour;
            self.next_hour += 1;

            let start_minutes = hour * 60;
            let end_minutes = start_minutes + self.config.slot_duration_minutes;
            // Truncated slots are dropped, never shortened
            if end_minutes > closing_minutes {
                continue;
            }

            // Local starts that fall into a DST gap do not exist
            let Some(start) = local_instant(self.date, start_minutes, self.config.timezone) else {
                continue;
            };
            let end = start + Duration::minutes(i64::from(self.config.slot_duration_minutes));

            return Some(CandidateSlot {
                date: self.date,
                start,
                end,
                start_time: minutes_to_time_string(start_minutes),
                end_time: minutes_to_time_string(end_minutes),
                label: slot_label(start_minutes, end_minutes),
            });
        }
        None
    }
}

impl FusedIterator for BusinessHourSlots {}

pub fn business_hour_slots(date: NaiveDate, config: BusinessHoursConfig) -> BusinessHourSlots {
    BusinessHourSlots::new(date, config)
}

fn local_instant(date: NaiveDate, minutes: u32, timezone: Tz) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(minutes / 60, minutes % 60, 0)?;
    timezone
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}
