use lifeboat_core::EquipmentStatus;
use serde::{Deserialize, Serialize};

/// Per-unit configuration for an endurance calculation strategy. The variant
/// in use is decided by the unit's `CapacityStrategy` tag; each variant
/// carries exactly the numbers that strategy's formula needs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapacityConfig {
    /// Hours run out linearly with charge level — batteries, UPS units.
    Linear { hours_per_100pct: f64 },
    /// Hours depend on remaining fuel volume and a burn rate — generators.
    FuelBased { tank_liters: f64, fuel_rate_lph: f64 },
    /// Runs as long as mains power is present; optionally capped by a
    /// battery bridge duration for the gap during a power cut.
    PowerDependent { power_hours_cap: Option<f64> },
    /// Equipment with no endurance concept — a scalpel, a stretcher.
    None,
}

/// The output of one endurance calculation: how many hours this unit can run
/// unattended, plus enough detail for a dashboard to explain the number.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalculationResult {
    pub hours: f64,
    pub capacity_used: f64,
    pub capacity_total: f64,
    pub excluded: bool,
    pub warning: Option<String>,
}

impl CalculationResult {
    fn excluded_result(note: &str) -> Self {
        Self {
            hours: 0.0,
            capacity_used: 0.0,
            capacity_total: 0.0,
            excluded: true,
            warning: Some(note.to_string()),
        }
    }
}

/// Compute remaining endurance hours for one unit given its charge/fuel
/// level (0.0-100.0), current status, and strategy config.
///
/// A unit in `MAINTENANCE`, `OFFLINE`, or `EMPTY` contributes nothing and is
/// flagged `excluded` rather than silently reporting zero hours — a caller
/// aggregating across a fleet needs to tell "unit excluded" apart from "unit
/// genuinely has zero capacity left".
pub fn calculate_hours(level_pct: f64, status: EquipmentStatus, config: &CapacityConfig) -> CalculationResult {
    if status.excluded_from_capacity() {
        return CalculationResult::excluded_result(&format!("unit status is {status:?}"));
    }

    let mut result = match config {
        CapacityConfig::Linear { hours_per_100pct } => {
            let hours = hours_per_100pct * (level_pct / 100.0);
            CalculationResult {
                hours,
                capacity_used: level_pct,
                capacity_total: 100.0,
                excluded: false,
                warning: None,
            }
        }
        CapacityConfig::FuelBased {
            tank_liters,
            fuel_rate_lph,
        } => {
            let current_fuel = tank_liters * (level_pct / 100.0);
            let hours = if *fuel_rate_lph > 0.0 {
                current_fuel / fuel_rate_lph
            } else {
                0.0
            };
            CalculationResult {
                hours,
                capacity_used: current_fuel,
                capacity_total: *tank_liters,
                excluded: false,
                warning: None,
            }
        }
        CapacityConfig::PowerDependent { power_hours_cap } => {
            let hours = power_hours_cap.unwrap_or(f64::INFINITY);
            CalculationResult {
                hours,
                capacity_used: level_pct,
                capacity_total: 100.0,
                excluded: false,
                warning: None,
            }
        }
        CapacityConfig::None => CalculationResult {
            hours: 0.0,
            capacity_used: 0.0,
            capacity_total: 0.0,
            excluded: false,
            warning: Some("non-resilience equipment".to_string()),
        },
    };

    if status.counts_with_warning() {
        result.warning = Some(format!("unit status is {status:?}; endurance may not survive isolation"));
    }

    result
}
