use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::slot_utils::{add_minutes, day_of_week, windows_overlap};
use super::types::{
    BlockedDate, CandidateSlot, Commitment, CommitmentKind, PoolSnapshot, ResourceAvailabilityWindow, ResourceKind,
};
use crate::config::{BufferConfig, CandidateWindow};
use crate::error::{AvailabilityError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    Booking,
    OnfleetTask,
    BlockedDate,
    OutsideAvailability,
}

impl From<CommitmentKind> for ConflictKind {
    fn from(kind: CommitmentKind) -> Self {
        match kind {
            CommitmentKind::Booking => ConflictKind::Booking,
            CommitmentKind::OnfleetTask => ConflictKind::OnfleetTask,
        }
    }
}

/// One reason a resource cannot take a candidate slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub kind: ConflictKind,
    pub reference: Option<String>,
    pub detail: String,
    pub blocked_from: Option<DateTime<Utc>>,
    pub blocked_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub resource_id: String,
    pub free: bool,
    pub conflicts: Vec<Conflict>,
}

/// Everything one driver or mover has on their calendar
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceSchedule {
    pub resource_id: String,
    pub windows: Vec<ResourceAvailabilityWindow>,
    pub blocked_dates: Vec<BlockedDate>,
    pub commitments: Vec<Commitment>,
}

impl ResourceSchedule {
    pub fn blocked_on(&self, slot: &CandidateSlot) -> Option<&BlockedDate> {
        self.blocked_dates.iter().find(|b| b.date == slot.date)
    }

    /// Weekly rule check. "HH:MM" strings are fixed width and zero padded,
    /// so lexical order is chronological order.
    pub fn covers(&self, slot: &CandidateSlot) -> bool {
        let day = day_of_week(slot.date);
        self.windows.iter().any(|w| {
            !w.is_blocked
                && w.day_of_week == day
                && w.start_time.as_str() <= slot.start_time.as_str()
                && w.end_time.as_str() >= slot.end_time.as_str()
        })
    }

    fn active_commitments(&self) -> impl Iterator<Item = &Commitment> {
        self.commitments.iter().filter(|c| c.occupies(&self.resource_id))
    }
}

/// Drivers or movers keyed by resource id
#[derive(Debug, Clone, PartialEq)]
pub struct ResourcePool {
    pub kind: ResourceKind,
    pub resources: BTreeMap<String, ResourceSchedule>,
}

impl ResourcePool {
    /// Groups raw rows per resource. The pool's members are the resources
    /// with at least one weekly availability row.
    pub fn from_snapshot(kind: ResourceKind, snapshot: &PoolSnapshot) -> Result<Self> {
        let mut resources: BTreeMap<String, ResourceSchedule> = BTreeMap::new();

        for window in snapshot.windows.iter().filter(|w| w.resource_kind == kind) {
            resources
                .entry(window.resource_id.clone())
                .or_insert_with(|| ResourceSchedule {
                    resource_id: window.resource_id.clone(),
                    ..ResourceSchedule::default()
                })
                .windows
                .push(window.clone());
        }

        for blocked in snapshot.blocked_dates.iter().filter(|b| b.resource_kind == kind) {
            if let Some(schedule) = resources.get_mut(&blocked.resource_id) {
                schedule.blocked_dates.push(blocked.clone());
            }
        }

        for commitment in snapshot.commitments.iter().filter(|c| c.resource_kind() == kind) {
            if !commitment.status.is_active() {
                continue;
            }
            let Some(resource_id) = commitment.resource_id.as_deref() else {
                continue;
            };
            match resources.get_mut(resource_id) {
                Some(schedule) => schedule.commitments.push(commitment.clone()),
                None => {
                    return Err(AvailabilityError::BusinessLogic(format!(
                        "commitment {} is assigned to {} {} which has no availability rows",
                        commitment.id, kind, resource_id
                    )))
                }
            }
        }

        Ok(Self { kind, resources })
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn schedules(&self) -> impl Iterator<Item = &ResourceSchedule> {
        self.resources.values()
    }
}

/// Decides whether a resource is free for a candidate slot
#[derive(Debug, Clone, Copy)]
pub struct ConflictDetector {
    buffers: BufferConfig,
}

impl ConflictDetector {
    pub fn new(buffers: BufferConfig) -> Self {
        Self { buffers }
    }

    /// `[anchor - before, anchor + service + after]`
    pub fn commitment_window(&self, anchor: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            add_minutes(anchor, -i64::from(self.buffers.before_minutes)),
            add_minutes(anchor, i64::from(self.buffers.service_minutes + self.buffers.after_minutes)),
        )
    }

    pub fn candidate_window(&self, slot: &CandidateSlot) -> (DateTime<Utc>, DateTime<Utc>) {
        match self.buffers.candidate_window {
            CandidateWindow::Slot => (slot.start, slot.end),
            CandidateWindow::Buffered => self.commitment_window(slot.start),
        }
    }

    fn collides(&self, candidate: (DateTime<Utc>, DateTime<Utc>), commitment: &Commitment) -> bool {
        let (start, end) = self.commitment_window(commitment.time);
        windows_overlap(candidate.0, candidate.1, start, end)
    }

    /// Fast path used by the aggregator
    pub fn is_free(&self, slot: &CandidateSlot, schedule: &ResourceSchedule) -> bool {
        if schedule.blocked_on(slot).is_some() || !schedule.covers(slot) {
            return false;
        }
        let candidate = self.candidate_window(slot);
        !schedule.active_commitments().any(|c| self.collides(candidate, c))
    }

    /// Full diagnosis with every conflict found
    pub fn check(&self, slot: &CandidateSlot, schedule: &ResourceSchedule) -> ConflictReport {
        let mut conflicts = Vec::new();

        if let Some(blocked) = schedule.blocked_on(slot) {
            conflicts.push(Conflict {
                kind: ConflictKind::BlockedDate,
                reference: None,
                detail: blocked
                    .reason
                    .clone()
                    .unwrap_or_else(|| format!("blocked for all of {}", blocked.date)),
                blocked_from: None,
                blocked_until: None,
            });
        }

        if !schedule.covers(slot) {
            conflicts.push(Conflict {
                kind: ConflictKind::OutsideAvailability,
                reference: None,
                detail: format!(
                    "no weekly availability covers {} on {}",
                    slot.label,
                    day_of_week(slot.date)
                ),
                blocked_from: None,
                blocked_until: None,
            });
        }

        let candidate = self.candidate_window(slot);
        for commitment in schedule.active_commitments() {
            if self.collides(candidate, commitment) {
                let (start, end) = self.commitment_window(commitment.time);
                conflicts.push(Conflict {
                    kind: commitment.kind.into(),
                    reference: Some(commitment.id.clone()),
                    detail: format!("committed at {}", commitment.time.format("%Y-%m-%d %H:%M UTC")),
                    blocked_from: Some(start),
                    blocked_until: Some(end),
                });
            }
        }

        ConflictReport {
            resource_id: schedule.resource_id.clone(),
            free: conflicts.is_empty(),
            conflicts,
        }
    }
}
