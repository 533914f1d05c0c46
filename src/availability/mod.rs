pub mod types;
pub mod slot_utils;
pub mod slots;
pub mod demand;
pub mod conflicts;
pub mod aggregate;

pub use aggregate::{Aggregator, DayCapacity, SlotDiagnosis};
pub use conflicts::{Conflict, ConflictDetector, ConflictKind, ConflictReport, ResourcePool, ResourceSchedule};
pub use demand::{calculate_demand, DemandReason, ResourceDemand};
pub use slot_utils::{day_of_week, time_string_to_minutes, windows_overlap, InvalidFormat};
pub use slots::{business_hour_slots, BusinessHourSlots};
pub use types::*;
