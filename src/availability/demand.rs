use serde::{Deserialize, Serialize};

use super::types::PlanType;

/// Why a booking needs the resources it does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandReason {
    /// Self-load: one driver leg per unit
    Diy,
    /// Mover crew covers the first unit, extra units need drivers
    FullService,
    /// Full service without a mover cannot be booked
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDemand {
    pub drivers_needed: u32,
    pub movers_needed: u32,
    pub reason: DemandReason,
}

impl ResourceDemand {
    pub fn is_satisfiable(&self) -> bool {
        self.reason != DemandReason::None
    }

    /// Whether the free counts cover this demand
    pub fn is_met_by(&self, free_drivers: usize, free_movers: usize) -> bool {
        self.is_satisfiable()
            && free_drivers >= self.drivers_needed as usize
            && free_movers >= self.movers_needed as usize
    }
}

/// Drivers and movers a booking requires
pub fn calculate_demand(plan_type: PlanType, unit_count: u32, mover_available: bool) -> ResourceDemand {
    match plan_type {
        PlanType::Diy => ResourceDemand {
            drivers_needed: unit_count,
            movers_needed: 0,
            reason: DemandReason::Diy,
        },
        PlanType::FullService if !mover_available => ResourceDemand {
            drivers_needed: 0,
            movers_needed: 1,
            reason: DemandReason::None,
        },
        PlanType::FullService => ResourceDemand {
            drivers_needed: unit_count.saturating_sub(1),
            movers_needed: 1,
            reason: DemandReason::FullService,
        },
    }
}
