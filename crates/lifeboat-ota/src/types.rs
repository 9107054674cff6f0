use semver::Version;
use serde::{Deserialize, Serialize};

/// A release as advertised by the update server's `GET` response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateInfo {
    pub version: Version,
    pub channel: String,
    pub download_url: String,
    pub signature_url: String,
    pub sha256: String,
    pub notes: String,
    pub released_at: i64,
}

/// One itemized check within a safety or health report. Each check reports
/// its own pass/fail and reason rather than the report only carrying an
/// aggregate boolean — an operator debugging a stuck rollout needs to know
/// which check failed, not just that something did.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SafetyReport {
    pub checks: Vec<CheckResult>,
}

impl SafetyReport {
    pub fn is_safe(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthReport {
    pub checks: Vec<CheckResult>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TickOutcome {
    Updated { from: Version, to: Version },
    UpToDate { current: Version },
    Skipped { version: Version },
    WaitActiveCases { open_cases: usize },
    HighLoad,
    RolledBack { failed_version: Version },
}
