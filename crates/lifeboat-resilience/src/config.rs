use serde::{Deserialize, Serialize};

use lifeboat_core::constants::{
    DEFAULT_ISOLATION_TARGET_DAYS, DEFAULT_POPULATION_COUNT, THRESHOLD_SAFE, THRESHOLD_WARNING,
};

/// Per-station resilience configuration. Absent a config row, a station
/// falls back to these defaults rather than refusing to compute a status —
/// an under-configured station should still tell its operator something.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub isolation_target_days: f64,
    pub population_count: u32,
    pub population_label: String,
    pub threshold_safe: f64,
    pub threshold_warning: f64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            isolation_target_days: DEFAULT_ISOLATION_TARGET_DAYS,
            population_count: DEFAULT_POPULATION_COUNT,
            population_label: "人數".to_string(),
            threshold_safe: THRESHOLD_SAFE,
            threshold_warning: THRESHOLD_WARNING,
        }
    }
}
