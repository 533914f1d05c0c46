use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Customer service tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanType {
    #[serde(rename = "DIY")]
    Diy,
    #[serde(rename = "FULL_SERVICE")]
    FullService,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Diy => "DIY",
            PlanType::FullService => "FULL_SERVICE",
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "DIY" => Ok(PlanType::Diy),
            "FULL_SERVICE" => Ok(PlanType::FullService),
            other => Err(format!("unknown plan type '{}', expected DIY or FULL_SERVICE", other)),
        }
    }
}

/// The two scarce resource pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Driver,
    Mover,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Driver => f.write_str("driver"),
            ResourceKind::Mover => f.write_str("mover"),
        }
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "driver" => Ok(ResourceKind::Driver),
            "mover" => Ok(ResourceKind::Mover),
            other => Err(format!("unknown resource kind '{}'", other)),
        }
    }
}

/// Canonical day-of-week names used by weekly availability rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Sunday,
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Sunday => "Sunday",
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Sun => DayOfWeek::Sunday,
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayOfWeek {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        DayOfWeek::ALL
            .iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(trimmed))
            .copied()
            .ok_or_else(|| format!("unknown day of week '{}'", trimmed))
    }
}

/// Recurring weekly availability rule for one driver or mover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAvailabilityWindow {
    pub resource_id: String,
    pub resource_kind: ResourceKind,
    pub day_of_week: DayOfWeek,
    pub start_time: String, // "HH:MM" local wall clock
    pub end_time: String,
    pub is_blocked: bool,
}

/// One-off removal of a resource's availability for a whole date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedDate {
    pub resource_id: String,
    pub resource_kind: ResourceKind,
    pub date: NaiveDate,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentKind {
    /// Customer appointment, staffed by a mover
    Booking,
    /// Dispatch-vendor delivery task, staffed by a driver
    OnfleetTask,
}

impl CommitmentKind {
    /// Pool whose resources are tied up by this kind of commitment
    pub fn resource_kind(&self) -> ResourceKind {
        match self {
            CommitmentKind::Booking => ResourceKind::Mover,
            CommitmentKind::OnfleetTask => ResourceKind::Driver,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentStatus {
    Scheduled,
    Confirmed,
    InTransit,
    Cancelled,
    Completed,
}

impl CommitmentStatus {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            CommitmentStatus::Scheduled | CommitmentStatus::Confirmed | CommitmentStatus::InTransit
        )
    }
}

/// A confirmed appointment or delivery task anchored at a single instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commitment {
    pub id: String,
    pub kind: CommitmentKind,
    pub resource_id: Option<String>, // assigned mover or driver
    pub time: DateTime<Utc>,
    pub status: CommitmentStatus,
    pub plan_type: Option<PlanType>,
    pub unit_count: Option<u32>,
}

impl Commitment {
    pub fn resource_kind(&self) -> ResourceKind {
        self.kind.resource_kind()
    }

    /// Whether this commitment currently occupies the given resource
    pub fn occupies(&self, resource_id: &str) -> bool {
        self.status.is_active() && self.resource_id.as_deref() == Some(resource_id)
    }
}

/// Ephemeral business-hour interval considered for booking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSlot {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub start_time: String, // "HH:MM" in the business timezone
    pub end_time: String,
    pub label: String,
}

/// Coarse bookability classification of one day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityTier {
    High,
    Medium,
    Low,
}

impl fmt::Display for AvailabilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AvailabilityTier::High => f.write_str("high"),
            AvailabilityTier::Medium => f.write_str("medium"),
            AvailabilityTier::Low => f.write_str("low"),
        }
    }
}

/// Per-slot result of a daily query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAvailability {
    #[serde(flatten)]
    pub slot: CandidateSlot,
    pub available_drivers: usize,
    pub available_movers: usize,
    pub drivers_needed: u32,
    pub movers_needed: u32,
    pub bookable: bool,
}

/// date -> tier, past dates omitted
pub type MonthlyAvailability = BTreeMap<NaiveDate, AvailabilityTier>;

/// Raw rows for one resource pool, as fetched for a single query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolSnapshot {
    pub windows: Vec<ResourceAvailabilityWindow>,
    pub blocked_dates: Vec<BlockedDate>,
    pub commitments: Vec<Commitment>,
}

/// Drivers and movers fetched for the same query window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub drivers: PoolSnapshot,
    pub movers: PoolSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_type_uses_wire_names() {
        assert_eq!(serde_json::to_string(&PlanType::FullService).unwrap(), "\"FULL_SERVICE\"");
        assert_eq!("DIY".parse::<PlanType>().unwrap(), PlanType::Diy);
        assert!("diy_plus".parse::<PlanType>().is_err());
    }

    #[test]
    fn day_of_week_parses_canonical_names() {
        assert_eq!("Monday".parse::<DayOfWeek>().unwrap(), DayOfWeek::Monday);
        assert_eq!("saturday".parse::<DayOfWeek>().unwrap(), DayOfWeek::Saturday);
        assert!("Mon".parse::<DayOfWeek>().is_err());
        assert_eq!(DayOfWeek::from(Weekday::Sun), DayOfWeek::Sunday);
    }

    #[test]
    fn only_active_assigned_commitments_occupy_a_resource() {
        let mut commitment = Commitment {
            id: "task-1".to_string(),
            kind: CommitmentKind::OnfleetTask,
            resource_id: Some("driver-1".to_string()),
            time: "2026-11-02T10:00:00Z".parse().unwrap(),
            status: CommitmentStatus::Confirmed,
            plan_type: None,
            unit_count: None,
        };
        assert!(commitment.occupies("driver-1"));
        assert!(!commitment.occupies("driver-2"));
        assert_eq!(commitment.resource_kind(), ResourceKind::Driver);

        commitment.status = CommitmentStatus::Cancelled;
        assert!(!commitment.occupies("driver-1"));
    }

    #[test]
    fn slot_availability_flattens_the_slot() {
        let slot = CandidateSlot {
            date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            start: "2026-11-02T09:00:00Z".parse().unwrap(),
            end: "2026-11-02T10:00:00Z".parse().unwrap(),
            start_time: "09:00".to_string(),
            end_time: "10:00".to_string(),
            label: "9am-10am".to_string(),
        };
        let value = serde_json::to_value(SlotAvailability {
            slot,
            available_drivers: 2,
            available_movers: 1,
            drivers_needed: 1,
            movers_needed: 0,
            bookable: true,
        })
        .unwrap();
        assert_eq!(value["label"], "9am-10am");
        assert_eq!(value["startTime"], "09:00");
        assert_eq!(value["availableDrivers"], 2);
        assert_eq!(value["bookable"], true);
    }
}
