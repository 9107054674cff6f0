use serde::{Deserialize, Serialize};

use lifeboat_core::EquipmentStatus;

use crate::capacity::CapacityConfig;
use crate::error::ResilienceError;

/// What a unit is currently committed to, if anything. A unit can be claimed
/// by a case or a mission but never both at once.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub case_id: Option<String>,
    pub mission_id: Option<String>,
}

impl Claim {
    pub fn is_claimed(&self) -> bool {
        self.case_id.is_some() || self.mission_id.is_some()
    }

    fn holder(&self) -> Option<&str> {
        self.case_id.as_deref().or(self.mission_id.as_deref())
    }
}

/// One piece of resilience-tracked equipment: its current operating state,
/// remaining capacity, and whatever it's committed to. Every state change
/// below is meant to be recorded as an event in the station's log; this type
/// only holds the current projection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EquipmentUnit {
    pub unit_id: String,
    pub equipment_type: String,
    pub status: EquipmentStatus,
    pub level_percent: f64,
    pub capacity_config: CapacityConfig,
    pub claim: Claim,
    pub is_active: bool,
}

impl EquipmentUnit {
    pub fn create(
        unit_id: impl Into<String>,
        equipment_type: impl Into<String>,
        capacity_config: CapacityConfig,
    ) -> Self {
        Self {
            unit_id: unit_id.into(),
            equipment_type: equipment_type.into(),
            status: EquipmentStatus::Available,
            level_percent: 100.0,
            capacity_config,
            claim: Claim::default(),
            is_active: true,
        }
    }

    pub fn check(&mut self, level_percent: f64, status: EquipmentStatus) {
        self.level_percent = level_percent;
        self.status = status;
    }

    /// Claim this unit for a case or mission. Exclusive: a unit already
    /// claimed by anyone refuses a second claimant with `UnitBusy`, mirroring
    /// the conditional `UPDATE … WHERE claimed_by IS NULL` the event store
    /// performs atomically on append.
    pub fn claim_for_case(&mut self, case_id: impl Into<String>) -> Result<(), ResilienceError> {
        self.claim_exclusive(Claim {
            case_id: Some(case_id.into()),
            mission_id: None,
        })
    }

    pub fn claim_for_mission(&mut self, mission_id: impl Into<String>) -> Result<(), ResilienceError> {
        self.claim_exclusive(Claim {
            case_id: None,
            mission_id: Some(mission_id.into()),
        })
    }

    fn claim_exclusive(&mut self, new_claim: Claim) -> Result<(), ResilienceError> {
        if !self.is_active {
            return Err(ResilienceError::UnitRetired(self.unit_id.clone()));
        }
        if self.claim.is_claimed() {
            let holder = self.claim.holder().unwrap_or("unknown").to_string();
            return Err(ResilienceError::AlreadyClaimed(self.unit_id.clone(), holder));
        }
        self.claim = new_claim;
        self.status = EquipmentStatus::InUse;
        Ok(())
    }

    pub fn release(&mut self, requester: &str, new_level_percent: Option<f64>) -> Result<(), ResilienceError> {
        let holder = self
            .claim
            .holder()
            .ok_or_else(|| ResilienceError::NotClaimed(self.unit_id.clone()))?;
        if holder != requester {
            return Err(ResilienceError::NotClaimHolder {
                unit: self.unit_id.clone(),
                holder: holder.to_string(),
                requester: requester.to_string(),
            });
        }
        self.claim = Claim::default();
        self.status = EquipmentStatus::Available;
        if let Some(level) = new_level_percent {
            self.level_percent = level;
        }
        Ok(())
    }

    pub fn retire(&mut self) {
        self.is_active = false;
        self.status = EquipmentStatus::Offline;
    }

    /// Whether this unit contributes to resilience aggregation: the right
    /// status, active, and not already committed to a consumer.
    pub fn contributes_to_capacity(&self) -> bool {
        self.is_active && self.status.counts_toward_capacity() && !self.claim.is_claimed()
    }
}
