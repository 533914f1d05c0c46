use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Source of "now" for past-day exclusion
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Today's calendar date in the given timezone
    fn today(&self, timezone: Tz) -> NaiveDate {
        self.now().with_timezone(&timezone).date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn today_is_taken_in_the_business_timezone() {
        let clock = FixedClock("2026-11-03T05:00:00Z".parse().unwrap());
        assert_eq!(clock.today(chrono_tz::UTC), NaiveDate::from_ymd_opt(2026, 11, 3).unwrap());
        assert_eq!(
            clock.today(chrono_tz::America::Los_Angeles),
            NaiveDate::from_ymd_opt(2026, 11, 2).unwrap()
        );
    }
}
