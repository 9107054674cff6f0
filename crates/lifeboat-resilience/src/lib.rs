pub mod capacity;
pub mod config;
pub mod engine;
pub mod equipment;
pub mod error;
pub mod reagent;

pub use capacity::{calculate_hours, CalculationResult, CapacityConfig};
pub use config::ResilienceConfig;
pub use engine::{
    aggregate_oxygen_hours, aggregate_power_hours, apply_dependency, evaluate, weakest_link_hours,
    ConsumptionProfile, EnduranceResult,
};
pub use equipment::{Claim, EquipmentUnit};
pub use error::ResilienceError;
pub use reagent::{evaluate_reagent, LimitedBy, ReagentEndurance};
