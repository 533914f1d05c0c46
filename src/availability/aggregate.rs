use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;

use super::conflicts::{ConflictDetector, ConflictReport, ResourcePool, ResourceSchedule};
use super::demand::{calculate_demand, ResourceDemand};
use super::slot_utils::day_of_week;
use super::slots::business_hour_slots;
use super::types::{AvailabilityTier, CandidateSlot, DayOfWeek, MonthlyAvailability, PlanType, SlotAvailability};
use crate::config::{BusinessHoursConfig, EngineConfig};

/// Supply-to-demand ratio at or above which a day is `high`
pub const HIGH_RATIO: f64 = 3.0;
/// Supply-to-demand ratio at or above which a day is `medium`
pub const MEDIUM_RATIO: f64 = 1.5;

/// `available / required`; a pool nobody asks for reads as 1
pub fn supply_ratio(available: usize, required: u32) -> f64 {
    if required == 0 {
        1.0
    } else {
        available as f64 / f64::from(required)
    }
}

pub fn classify(min_ratio: f64) -> AvailabilityTier {
    if min_ratio >= HIGH_RATIO {
        AvailabilityTier::High
    } else if min_ratio >= MEDIUM_RATIO {
        AvailabilityTier::Medium
    } else {
        AvailabilityTier::Low
    }
}

/// Day-level supply figures behind a tier
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCapacity {
    pub date: NaiveDate,
    pub available_drivers: usize,
    pub available_movers: usize,
    pub driver_ratio: f64,
    pub mover_ratio: f64,
    pub min_ratio: f64,
    pub tier: AvailabilityTier,
}

impl DayCapacity {
    pub fn new(date: NaiveDate, available_drivers: usize, available_movers: usize, demand: &ResourceDemand) -> Self {
        let driver_ratio = supply_ratio(available_drivers, demand.drivers_needed);
        let mover_ratio = supply_ratio(available_movers, demand.movers_needed);

        // Only pools with a real requirement constrain the day
        let constrained = [
            (demand.drivers_needed, driver_ratio),
            (demand.movers_needed, mover_ratio),
        ];
        let min_ratio = constrained
            .iter()
            .filter(|(required, _)| *required > 0)
            .map(|(_, ratio)| *ratio)
            .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.min(r))))
            .unwrap_or(1.0);

        Self {
            date,
            available_drivers,
            available_movers,
            driver_ratio,
            mover_ratio,
            min_ratio,
            tier: classify(min_ratio),
        }
    }
}

/// Per-resource verdicts for one slot, for admin tooling
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotDiagnosis {
    pub slot: CandidateSlot,
    pub drivers: Vec<ConflictReport>,
    pub movers: Vec<ConflictReport>,
}

/// Rolls per-resource conflict checks into monthly and daily results
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    detector: ConflictDetector,
    business_hours: BusinessHoursConfig,
}

impl Aggregator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            detector: ConflictDetector::new(config.buffers),
            business_hours: config.business_hours,
        }
    }

    pub fn slots(&self, date: NaiveDate) -> Vec<CandidateSlot> {
        business_hour_slots(date, self.business_hours).collect()
    }

    fn free_on_any(&self, slots: &[CandidateSlot], candidates: &[&ResourceSchedule]) -> usize {
        candidates
            .iter()
            .filter(|schedule| slots.iter().any(|slot| self.detector.is_free(slot, schedule)))
            .count()
    }

    /// Supply figures for every date of the month from today on. Today only
    /// counts slots that have not started yet.
    pub fn monthly_capacity(
        &self,
        plan_type: PlanType,
        number_of_units: u32,
        first_of_month: NaiveDate,
        now: DateTime<Utc>,
        drivers: &ResourcePool,
        movers: &ResourcePool,
    ) -> Vec<DayCapacity> {
        let demand = calculate_demand(plan_type, number_of_units, true);
        let month = first_of_month.month();
        let today = now.with_timezone(&self.business_hours.timezone).date_naive();

        // Weekly rules repeat, so who could work a given weekday is settled
        // once; date-specific blocks and commitments are applied per day.
        let mut baselines: HashMap<DayOfWeek, (Vec<&ResourceSchedule>, Vec<&ResourceSchedule>)> = HashMap::new();

        let mut days = Vec::new();
        for date in first_of_month.iter_days().take_while(|d| d.month() == month) {
            if date < today {
                continue;
            }
            let slots = self.slots(date);
            let (driver_base, mover_base) = baselines.entry(day_of_week(date)).or_insert_with(|| {
                (
                    weekday_baseline(drivers, &slots),
                    weekday_baseline(movers, &slots),
                )
            });

            let open_slots: Vec<CandidateSlot> = if date == today {
                slots.into_iter().filter(|slot| slot.start > now).collect()
            } else {
                slots
            };

            let available_drivers = self.free_on_any(&open_slots, driver_base);
            let available_movers = self.free_on_any(&open_slots, mover_base);
            days.push(DayCapacity::new(date, available_drivers, available_movers, &demand));
        }
        days
    }

    pub fn monthly(
        &self,
        plan_type: PlanType,
        number_of_units: u32,
        first_of_month: NaiveDate,
        now: DateTime<Utc>,
        drivers: &ResourcePool,
        movers: &ResourcePool,
    ) -> MonthlyAvailability {
        self.monthly_capacity(plan_type, number_of_units, first_of_month, now, drivers, movers)
            .into_iter()
            .map(|day| (day.date, day.tier))
            .collect()
    }

    /// Every business-hour slot of `date` with free counts and bookability
    pub fn daily(
        &self,
        plan_type: PlanType,
        number_of_units: u32,
        date: NaiveDate,
        now: DateTime<Utc>,
        drivers: &ResourcePool,
        movers: &ResourcePool,
    ) -> Vec<SlotAvailability> {
        business_hour_slots(date, self.business_hours)
            .map(|slot| {
                let available_drivers = drivers.schedules().filter(|s| self.detector.is_free(&slot, s)).count();
                let available_movers = movers.schedules().filter(|s| self.detector.is_free(&slot, s)).count();
                let demand = calculate_demand(plan_type, number_of_units, available_movers > 0);
                let bookable = slot.start > now && demand.is_met_by(available_drivers, available_movers);
                SlotAvailability {
                    slot,
                    available_drivers,
                    available_movers,
                    drivers_needed: demand.drivers_needed,
                    movers_needed: demand.movers_needed,
                    bookable,
                }
            })
            .collect()
    }

    pub fn diagnose(&self, slot: CandidateSlot, drivers: &ResourcePool, movers: &ResourcePool) -> SlotDiagnosis {
        let drivers = drivers.schedules().map(|s| self.detector.check(&slot, s)).collect();
        let movers = movers.schedules().map(|s| self.detector.check(&slot, s)).collect();
        SlotDiagnosis { slot, drivers, movers }
    }
}

/// Resources whose weekly rules admit at least one of the slots
fn weekday_baseline<'p>(pool: &'p ResourcePool, slots: &[CandidateSlot]) -> Vec<&'p ResourceSchedule> {
    pool.schedules()
        .filter(|schedule| slots.iter().any(|slot| schedule.covers(slot)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::types::{
        BlockedDate, Commitment, CommitmentKind, CommitmentStatus, PoolSnapshot, ResourceAvailabilityWindow,
        ResourceKind,
    };

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.business_hours.timezone = chrono_tz::UTC;
        config
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(raw: &str) -> DateTime<Utc> {
        raw.parse().unwrap()
    }

    fn every_day(kind: ResourceKind, id: &str) -> Vec<ResourceAvailabilityWindow> {
        DayOfWeek::ALL
            .iter()
            .map(|day| ResourceAvailabilityWindow {
                resource_id: id.to_string(),
                resource_kind: kind,
                day_of_week: *day,
                start_time: "09:00".to_string(),
                end_time: "18:00".to_string(),
                is_blocked: false,
            })
            .collect()
    }

    fn pool(kind: ResourceKind, count: usize) -> PoolSnapshot {
        let prefix = kind.to_string();
        PoolSnapshot {
            windows: (1..=count).flat_map(|i| every_day(kind, &format!("{prefix}-{i}"))).collect(),
            ..PoolSnapshot::default()
        }
    }

    fn build(kind: ResourceKind, snapshot: &PoolSnapshot) -> ResourcePool {
        ResourcePool::from_snapshot(kind, snapshot).unwrap()
    }

    fn commitment(id: &str, kind: CommitmentKind, resource: &str, time: &str) -> Commitment {
        Commitment {
            id: id.to_string(),
            kind,
            resource_id: Some(resource.to_string()),
            time: time.parse().unwrap(),
            status: CommitmentStatus::Scheduled,
            plan_type: None,
            unit_count: None,
        }
    }

    #[test]
    fn tier_bands_are_inclusive_at_their_lower_edge() {
        assert_eq!(classify(3.0), AvailabilityTier::High);
        assert_eq!(classify(2.99), AvailabilityTier::Medium);
        assert_eq!(classify(1.5), AvailabilityTier::Medium);
        assert_eq!(classify(1.49), AvailabilityTier::Low);
        assert_eq!(classify(0.0), AvailabilityTier::Low);
    }

    #[test]
    fn zero_requirement_reads_as_ratio_one() {
        assert_eq!(supply_ratio(0, 0), 1.0);
        assert_eq!(supply_ratio(7, 0), 1.0);
        assert_eq!(supply_ratio(3, 2), 1.5);
    }

    #[test]
    fn unrequired_pool_does_not_cap_the_day() {
        let demand = calculate_demand(PlanType::Diy, 1, true);
        let day = DayCapacity::new(date(2026, 11, 2), 4, 0, &demand);
        assert_eq!(day.mover_ratio, 1.0);
        assert_eq!(day.min_ratio, 4.0);
        assert_eq!(day.tier, AvailabilityTier::High);
    }

    #[test]
    fn ratio_of_exactly_one_and_a_half_is_medium_every_day() {
        let aggregator = Aggregator::new(&config());
        let drivers = build(ResourceKind::Driver, &pool(ResourceKind::Driver, 3));
        let movers = build(ResourceKind::Mover, &pool(ResourceKind::Mover, 0));

        let month = aggregator.monthly(PlanType::Diy, 2, date(2026, 11, 1), at("2026-10-18T00:00:00Z"), &drivers, &movers);
        assert_eq!(month.len(), 30);
        assert!(month.values().all(|tier| *tier == AvailabilityTier::Medium));
    }

    #[test]
    fn full_service_tier_follows_the_scarcer_pool() {
        let aggregator = Aggregator::new(&config());
        let drivers = build(ResourceKind::Driver, &pool(ResourceKind::Driver, 6));
        let movers = build(ResourceKind::Mover, &pool(ResourceKind::Mover, 2));

        // 3 units: 2 drivers (ratio 3) and 1 mover (ratio 2)
        let month = aggregator.monthly(PlanType::FullService, 3, date(2026, 11, 1), at("2026-11-01T00:00:00Z"), &drivers, &movers);
        assert!(month.values().all(|tier| *tier == AvailabilityTier::Medium));

        let none = build(ResourceKind::Mover, &pool(ResourceKind::Mover, 0));
        let month = aggregator.monthly(PlanType::FullService, 1, date(2026, 11, 1), at("2026-11-01T00:00:00Z"), &drivers, &none);
        assert!(month.values().all(|tier| *tier == AvailabilityTier::Low));
    }

    #[test]
    fn today_only_counts_slots_still_ahead() {
        let aggregator = Aggregator::new(&config());
        let mut snapshot = pool(ResourceKind::Driver, 3);
        snapshot
            .commitments
            .push(commitment("task-1", CommitmentKind::OnfleetTask, "driver-1", "2026-11-15T17:00:00Z"));
        let drivers = build(ResourceKind::Driver, &snapshot);
        let movers = build(ResourceKind::Mover, &pool(ResourceKind::Mover, 0));

        // Only the 17:00 slot is left, and driver-1 is busy for it
        let days = aggregator.monthly_capacity(PlanType::Diy, 1, date(2026, 11, 1), at("2026-11-15T16:30:00Z"), &drivers, &movers);
        assert_eq!(days[0].date, date(2026, 11, 15));
        assert_eq!(days[0].available_drivers, 2);
        assert_eq!(days[0].tier, AvailabilityTier::Medium);

        let after_close = aggregator.monthly(PlanType::Diy, 1, date(2026, 11, 1), at("2026-11-15T18:30:00Z"), &drivers, &movers);
        assert_eq!(after_close.get(&date(2026, 11, 15)), Some(&AvailabilityTier::Low));
        assert_eq!(after_close.get(&date(2026, 11, 16)), Some(&AvailabilityTier::High));
    }

    #[test]
    fn past_dates_are_omitted_not_marked_low() {
        let aggregator = Aggregator::new(&config());
        let drivers = build(ResourceKind::Driver, &pool(ResourceKind::Driver, 3));
        let movers = build(ResourceKind::Mover, &pool(ResourceKind::Mover, 0));

        let month = aggregator.monthly(PlanType::Diy, 1, date(2026, 11, 1), at("2026-11-15T00:00:00Z"), &drivers, &movers);
        assert_eq!(month.len(), 16);
        assert!(!month.contains_key(&date(2026, 11, 14)));
        assert_eq!(month.get(&date(2026, 11, 15)), Some(&AvailabilityTier::High));

        let past = aggregator.monthly(PlanType::Diy, 1, date(2026, 9, 1), at("2026-11-15T00:00:00Z"), &drivers, &movers);
        assert!(past.is_empty());
    }

    #[test]
    fn blocked_and_fully_booked_resources_drop_out_for_that_date() {
        let aggregator = Aggregator::new(&config());
        let mut snapshot = pool(ResourceKind::Driver, 3);
        snapshot.blocked_dates.push(BlockedDate {
            resource_id: "driver-1".to_string(),
            resource_kind: ResourceKind::Driver,
            date: date(2026, 11, 3),
            reason: None,
        });
        // Three tasks 3 hours apart cover 09:00-18:00 for driver-2
        for (i, hour) in [10, 13, 16].iter().enumerate() {
            snapshot.commitments.push(commitment(
                &format!("task-{i}"),
                CommitmentKind::OnfleetTask,
                "driver-2",
                &format!("2026-11-03T{hour:02}:00:00Z"),
            ));
        }
        let drivers = build(ResourceKind::Driver, &snapshot);
        let movers = build(ResourceKind::Mover, &pool(ResourceKind::Mover, 0));

        let days = aggregator.monthly_capacity(PlanType::Diy, 1, date(2026, 11, 1), at("2026-11-01T00:00:00Z"), &drivers, &movers);
        let tuesday = days.iter().find(|d| d.date == date(2026, 11, 3)).unwrap();
        assert_eq!(tuesday.available_drivers, 1);
        assert_eq!(tuesday.tier, AvailabilityTier::Low);
        let wednesday = days.iter().find(|d| d.date == date(2026, 11, 4)).unwrap();
        assert_eq!(wednesday.available_drivers, 3);
        assert_eq!(wednesday.tier, AvailabilityTier::High);
    }

    #[test]
    fn diy_daily_marks_slots_inside_the_buffer_unbookable() {
        let aggregator = Aggregator::new(&config());
        let mut snapshot = PoolSnapshot {
            windows: every_day(ResourceKind::Driver, "driver-1"),
            ..PoolSnapshot::default()
        };
        snapshot
            .commitments
            .push(commitment("task-1", CommitmentKind::OnfleetTask, "driver-1", "2026-11-02T10:00:00Z"));
        let drivers = build(ResourceKind::Driver, &snapshot);
        let movers = build(ResourceKind::Mover, &PoolSnapshot::default());

        let now: DateTime<Utc> = "2026-10-18T12:00:00Z".parse().unwrap();
        let slots = aggregator.daily(PlanType::Diy, 1, date(2026, 11, 2), now, &drivers, &movers);
        let bookable: Vec<(&str, bool)> = slots.iter().map(|s| (s.slot.label.as_str(), s.bookable)).collect();
        assert_eq!(
            bookable,
            vec![
                ("9am-10am", false),
                ("10am-11am", false),
                ("11am-12pm", false),
                ("12pm-1pm", true),
                ("1pm-2pm", true),
                ("2pm-3pm", true),
                ("3pm-4pm", true),
                ("4pm-5pm", true),
                ("5pm-6pm", true),
            ]
        );
        assert_eq!(slots[0].drivers_needed, 1);
        assert_eq!(slots[0].available_drivers, 0);
    }

    #[test]
    fn full_service_single_unit_ignores_driver_conflicts() {
        let aggregator = Aggregator::new(&config());
        let mut driver_rows = PoolSnapshot {
            windows: every_day(ResourceKind::Driver, "driver-1"),
            ..PoolSnapshot::default()
        };
        for (i, hour) in [10, 13, 16].iter().enumerate() {
            driver_rows.commitments.push(commitment(
                &format!("task-{i}"),
                CommitmentKind::OnfleetTask,
                "driver-1",
                &format!("2026-11-02T{hour:02}:00:00Z"),
            ));
        }
        let drivers = build(ResourceKind::Driver, &driver_rows);
        let movers = build(ResourceKind::Mover, &pool(ResourceKind::Mover, 1));

        let now: DateTime<Utc> = "2026-10-18T12:00:00Z".parse().unwrap();
        let slots = aggregator.daily(PlanType::FullService, 1, date(2026, 11, 2), now, &drivers, &movers);
        assert_eq!(slots.len(), 9);
        assert!(slots.iter().all(|s| s.available_drivers == 0));
        assert!(slots.iter().all(|s| s.bookable && s.drivers_needed == 0 && s.movers_needed == 1));
    }

    #[test]
    fn full_service_without_free_mover_is_never_bookable() {
        let aggregator = Aggregator::new(&config());
        let drivers = build(ResourceKind::Driver, &pool(ResourceKind::Driver, 5));
        let mut mover_rows = pool(ResourceKind::Mover, 1);
        mover_rows.blocked_dates.push(BlockedDate {
            resource_id: "mover-1".to_string(),
            resource_kind: ResourceKind::Mover,
            date: date(2026, 11, 2),
            reason: Some("holiday".to_string()),
        });
        let movers = build(ResourceKind::Mover, &mover_rows);

        let now: DateTime<Utc> = "2026-10-18T12:00:00Z".parse().unwrap();
        let slots = aggregator.daily(PlanType::FullService, 2, date(2026, 11, 2), now, &drivers, &movers);
        assert!(slots.iter().all(|s| !s.bookable && s.drivers_needed == 0));
    }

    #[test]
    fn slots_already_started_are_not_bookable() {
        let aggregator = Aggregator::new(&config());
        let drivers = build(ResourceKind::Driver, &pool(ResourceKind::Driver, 2));
        let movers = build(ResourceKind::Mover, &PoolSnapshot::default());

        let now: DateTime<Utc> = "2026-11-02T12:30:00Z".parse().unwrap();
        let slots = aggregator.daily(PlanType::Diy, 1, date(2026, 11, 2), now, &drivers, &movers);
        let first_bookable = slots.iter().find(|s| s.bookable).unwrap();
        assert_eq!(first_bookable.slot.label, "1pm-2pm");
        assert_eq!(slots[0].available_drivers, 2);
    }

    #[test]
    fn diagnosis_lists_each_resource() {
        let aggregator = Aggregator::new(&config());
        let mut snapshot = pool(ResourceKind::Driver, 2);
        snapshot
            .commitments
            .push(commitment("task-1", CommitmentKind::OnfleetTask, "driver-2", "2026-11-02T10:00:00Z"));
        let drivers = build(ResourceKind::Driver, &snapshot);
        let movers = build(ResourceKind::Mover, &PoolSnapshot::default());

        let slot = aggregator.slots(date(2026, 11, 2)).remove(1);
        let diagnosis = aggregator.diagnose(slot, &drivers, &movers);
        assert_eq!(diagnosis.drivers.len(), 2);
        assert!(diagnosis.drivers[0].free);
        assert!(!diagnosis.drivers[1].free);
        assert!(diagnosis.movers.is_empty());
    }
}
