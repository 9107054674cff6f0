use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitedBy {
    Volume,
    ExpiryAfterOpen,
}

/// A reagent's endurance is the Law of Weakest Link applied to two
/// independent limits: how much is left, and how long it stays usable once
/// opened. Whichever runs out first decides the unit's true effective days.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReagentEndurance {
    pub days_by_volume: f64,
    pub days_by_expiry: f64,
    pub effective_days: f64,
    pub limited_by: LimitedBy,
}

pub fn evaluate_reagent(days_by_volume: f64, days_by_expiry: f64) -> ReagentEndurance {
    let (effective_days, limited_by) = if days_by_volume <= days_by_expiry {
        (days_by_volume, LimitedBy::Volume)
    } else {
        (days_by_expiry, LimitedBy::ExpiryAfterOpen)
    };

    ReagentEndurance {
        days_by_volume,
        days_by_expiry,
        effective_days,
        limited_by,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_is_the_binding_constraint_when_it_runs_out_first() {
        let result = evaluate_reagent(2.0, 10.0);
        assert_eq!(result.effective_days, 2.0);
        assert_eq!(result.limited_by, LimitedBy::Volume);
    }

    #[test]
    fn expiry_is_the_binding_constraint_when_it_runs_out_first() {
        let result = evaluate_reagent(10.0, 3.0);
        assert_eq!(result.effective_days, 3.0);
        assert_eq!(result.limited_by, LimitedBy::ExpiryAfterOpen);
    }

    #[test]
    fn tie_prefers_volume_as_the_reported_limit() {
        let result = evaluate_reagent(5.0, 5.0);
        assert_eq!(result.limited_by, LimitedBy::Volume);
    }
}
