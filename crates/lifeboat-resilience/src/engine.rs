use lifeboat_core::ResilienceLevel;
use serde::{Deserialize, Serialize};

use crate::config::ResilienceConfig;

/// A named consumption scenario for a lifeline — burn rate plus a label an
/// operator recognizes ("standard adult ventilation", "two concurrent
/// cases").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsumptionProfile {
    pub name: String,
    pub burn_rate: f64,
    /// When true, `burn_rate` is scaled by population count (e.g. oxygen
    /// consumed per intubated patient).
    pub population_multiplier: bool,
}

/// The full computed status for one lifeline (oxygen, power, a reagent).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnduranceResult {
    pub raw_hours: f64,
    pub effective_hours: f64,
    pub effective_days: f64,
    pub status: ResilienceLevel,
    pub ratio: f64,
    pub can_survive: bool,
    pub gap_hours: f64,
    pub message: String,
}

/// Apply the Law of Dependency: a lifeline's endurance can never exceed
/// whatever it depends on. A ventilator's endurance is capped by the oxygen
/// supply it draws from even if its own battery would run longer.
pub fn apply_dependency(raw_hours: f64, dependency_hours: Option<f64>) -> f64 {
    match dependency_hours {
        Some(dep) => raw_hours.min(dep),
        None => raw_hours,
    }
}

/// Add two power sources' hours — batteries drain first, then the generator
/// picks up, so total runway is additive.
pub fn aggregate_power_hours(battery_hours: f64, generator_hours: f64) -> f64 {
    battery_hours + generator_hours
}

/// Oxygen cylinders and a concentrator are alternative sources, not
/// sequential ones; the station survives as long as the better of the two
/// holds out.
pub fn aggregate_oxygen_hours(cylinder_hours: f64, concentrator_hours: f64) -> f64 {
    cylinder_hours.max(concentrator_hours)
}

/// The station-wide weakest-link summary: the minimum of the two
/// independently-aggregated lifelines, not the minimum of every raw unit
/// (which would double-count a dependency already folded into one of them).
pub fn weakest_link_hours(power_hours: f64, oxygen_hours: f64) -> f64 {
    power_hours.min(oxygen_hours)
}

/// Evaluate one lifeline's status against a station's resilience config.
///
/// `raw_hours` is the aggregated capacity (already through dependency
/// capping if applicable); `effective_burn_rate` is the profile's burn rate,
/// scaled by population count by the caller when the profile calls for it.
/// A non-positive burn rate or zero raw capacity yields UNKNOWN rather than
/// a misleadingly precise CRITICAL — there's nothing to extrapolate from.
pub fn evaluate(raw_hours: f64, effective_burn_rate: f64, config: &ResilienceConfig) -> EnduranceResult {
    let isolation_hours = config.isolation_target_days * 24.0;

    if effective_burn_rate <= 0.0 || raw_hours <= 0.0 {
        return EnduranceResult {
            raw_hours,
            effective_hours: raw_hours,
            effective_days: raw_hours / 24.0,
            status: ResilienceLevel::Unknown,
            ratio: 0.0,
            can_survive: false,
            gap_hours: isolation_hours - raw_hours,
            message: "insufficient data to project endurance".to_string(),
        };
    }

    let effective_hours = raw_hours;
    let ratio = effective_hours / isolation_hours;

    let status = if ratio >= config.threshold_safe {
        ResilienceLevel::Safe
    } else if ratio >= config.threshold_warning {
        ResilienceLevel::Warning
    } else {
        ResilienceLevel::Critical
    };

    let can_survive = effective_hours >= isolation_hours;
    let gap_hours = isolation_hours - effective_hours;

    let message = match status {
        ResilienceLevel::Safe => format!("endurance covers {:.1}x the isolation target", ratio),
        ResilienceLevel::Warning => "endurance is below the safety margin".to_string(),
        ResilienceLevel::Critical => format!("endurance falls short by {:.1}h", gap_hours.max(0.0)),
        ResilienceLevel::Unknown => unreachable!(),
    };

    EnduranceResult {
        raw_hours,
        effective_hours,
        effective_days: effective_hours / 24.0,
        status,
        ratio,
        can_survive,
        gap_hours,
        message,
    }
}
