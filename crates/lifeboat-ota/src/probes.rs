use async_trait::async_trait;

use crate::error::OtaError;
use crate::types::{HealthReport, SafetyReport, UpdateInfo};

/// Talks to the fleet update server. Split out from the scheduler so tests
/// can substitute a fake server without spinning up `reqwest`.
#[async_trait]
pub trait UpdateServerClient: Send + Sync {
    async fn latest(&self, channel: &str) -> Result<UpdateInfo, OtaError>;
    async fn download(&self, info: &UpdateInfo) -> Result<Vec<u8>, OtaError>;
}

/// Reports whether any case is currently open on this station. An open case
/// blocks updates outright — clinical work is never interrupted for OTA.
#[async_trait]
pub trait ActiveCaseGuard: Send + Sync {
    async fn open_case_count(&self) -> Result<usize, OtaError>;
}

/// Coarse system load probe (CPU, battery, thermal). Updates defer rather
/// than compete with clinical workloads for resources.
#[async_trait]
pub trait SystemLoadProbe: Send + Sync {
    async fn is_high_load(&self) -> Result<bool, OtaError>;
}

/// Confirms the station's clock is trustworthy enough to evaluate
/// expiry/signature timestamps. A station with an unattested clock must not
/// silently accept or reject updates based on bogus time.
#[async_trait]
pub trait TimeGate: Send + Sync {
    async fn is_time_valid(&self) -> Result<bool, OtaError>;
}

/// Verifies a downloaded package's Minisign signature against the pinned
/// release key. Separate from the sha256 check, which the scheduler does
/// directly since it's just a digest of bytes already in hand.
#[async_trait]
pub trait PackageVerifier: Send + Sync {
    async fn verify_signature(&self, package_bytes: &[u8], signature_url: &str) -> Result<bool, OtaError>;
}

/// Runs the pre-update safety checks and the post-swap health checks.
#[async_trait]
pub trait StationProbe: Send + Sync {
    async fn safety_report(&self) -> Result<SafetyReport, OtaError>;
    async fn health_report(&self) -> Result<HealthReport, OtaError>;
}

/// Restarts the running service after a successful swap. A no-op
/// implementation is fine for a test double; the real one execs or signals
/// the supervised process.
#[async_trait]
pub trait ServiceRestarter: Send + Sync {
    async fn restart(&self) -> Result<(), OtaError>;
}
