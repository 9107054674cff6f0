use std::sync::Arc;

use lifeboat_core::constants::OTA_RETAINED_VERSIONS;
use semver::Version;
use sha2::{Digest, Sha256};

use crate::error::OtaError;
use crate::probes::{
    ActiveCaseGuard, PackageVerifier, ServiceRestarter, StationProbe, SystemLoadProbe, TimeGate,
    UpdateServerClient,
};
use crate::skiplist::SkipList;
use crate::types::TickOutcome;
use crate::version_store::VersionStore;

const BINARY_NAME: &str = "station";

pub struct OtaScheduler {
    channel: String,
    current_version: Version,
    versions: VersionStore,
    skip_list: SkipList,
    update_server: Arc<dyn UpdateServerClient>,
    active_cases: Arc<dyn ActiveCaseGuard>,
    system_load: Arc<dyn SystemLoadProbe>,
    time_gate: Arc<dyn TimeGate>,
    verifier: Arc<dyn PackageVerifier>,
    station: Arc<dyn StationProbe>,
    restarter: Arc<dyn ServiceRestarter>,
}

#[allow(clippy::too_many_arguments)]
impl OtaScheduler {
    pub fn new(
        channel: impl Into<String>,
        current_version: Version,
        versions: VersionStore,
        skip_list: SkipList,
        update_server: Arc<dyn UpdateServerClient>,
        active_cases: Arc<dyn ActiveCaseGuard>,
        system_load: Arc<dyn SystemLoadProbe>,
        time_gate: Arc<dyn TimeGate>,
        verifier: Arc<dyn PackageVerifier>,
        station: Arc<dyn StationProbe>,
        restarter: Arc<dyn ServiceRestarter>,
    ) -> Self {
        Self {
            channel: channel.into(),
            current_version,
            versions,
            skip_list,
            update_server,
            active_cases,
            system_load,
            time_gate,
            verifier,
            station,
            restarter,
        }
    }

    /// Runs one full OTA cycle per spec's nine-step tick. Returns as soon as
    /// an early-exit condition is hit; a failure partway through a real
    /// update attempt rolls the swap back and records the version as
    /// permanently skipped rather than propagating a bare error upward.
    pub async fn tick(&mut self) -> Result<TickOutcome, OtaError> {
        // 1. active-case guard
        let open_cases = self.active_cases.open_case_count().await?;
        if open_cases > 0 {
            return Err(OtaError::WaitActiveCases(open_cases));
        }

        // 2. time validity gate
        if !self.time_gate.is_time_valid().await? {
            return Err(OtaError::TimeInvalid);
        }

        // 3. system load check
        if self.system_load.is_high_load().await? {
            return Err(OtaError::HighLoad);
        }

        // 4. discover
        let info = self.update_server.latest(&self.channel).await?;
        if info.version <= self.current_version {
            return Ok(TickOutcome::UpToDate { current: self.current_version.clone() });
        }
        if self.skip_list.contains(&info.version.to_string())? {
            return Err(OtaError::Skipped(info.version.to_string()));
        }

        // 5. download + verify
        let package_bytes = self
            .update_server
            .download(&info)
            .await
            .map_err(|e| OtaError::DownloadFailed(e.to_string()))?;

        let digest = hex::encode(Sha256::digest(&package_bytes));
        if digest != info.sha256 {
            self.skip_list.add(&info.version.to_string(), "sha256 mismatch")?;
            return Err(OtaError::HashMismatch { expected: info.sha256.clone(), got: digest });
        }

        let signature_ok = self
            .verifier
            .verify_signature(&package_bytes, &info.signature_url)
            .await?;
        if !signature_ok {
            self.skip_list.add(&info.version.to_string(), "signature invalid")?;
            return Err(OtaError::SignatureInvalid);
        }

        let safety = self.station.safety_report().await?;
        if !safety.is_safe() {
            let reasons: Vec<_> = safety.failures().iter().map(|c| c.name.clone()).collect();
            return Err(OtaError::HealthCheckFailed(format!(
                "pre-update safety check failed: {}",
                reasons.join(", ")
            )));
        }

        // 6. stage into versions/{new_version}/ (double buffering)
        let target_version = info.version.to_string();
        self.versions.stage(&target_version, BINARY_NAME, &package_bytes)?;

        // 7. atomic swap, remembering the prior version for rollback
        let previous_version = self.current_version.clone();
        self.versions.swap_to(&target_version)?;

        // 8. restart service
        self.restarter.restart().await?;

        // 9. post-swap health check, with rollback-and-skip-on-failure
        let health = self.station.health_report().await?;
        if !health.is_healthy() {
            self.versions.swap_to(&previous_version.to_string())?;
            self.restarter.restart().await?;
            self.skip_list.add(&target_version, "post-swap health check failed")?;
            return Ok(TickOutcome::RolledBack { failed_version: info.version });
        }

        self.current_version = info.version.clone();
        self.versions.prune_old_versions(OTA_RETAINED_VERSIONS)?;
        Ok(TickOutcome::Updated { from: previous_version, to: info.version })
    }
}
