use lifeboat_core::constants::{
    DEFAULT_ALLOWED_ROLES, DEFAULT_MOBILE_SCOPES, PAIRING_CODE_TTL_SECS, RATE_LIMIT_ATTEMPTS,
    RATE_LIMIT_WINDOW_SECS, SESSION_TOKEN_TTL_SECS,
};
use lifeboat_crypto::StationKeypair;

use crate::actions::ActionLog;
use crate::device::{DeviceStore, MobileDevice};
use crate::error::SessionError;
use crate::pairing::{PairingCode, PairingCodeStore};
use crate::ratelimit::RateLimiter;
use crate::token::{SessionClaims, SessionToken};

/// Result of a successful pairing-code exchange: the issued token plus the
/// station/role/scope context a client needs to bootstrap its session.
pub struct ExchangeResult {
    pub access_token: String,
    pub expires_in_secs: i64,
    pub station_id: String,
    pub staff_id: String,
    pub staff_name: String,
    pub role: String,
    pub scopes: Vec<String>,
}

/// Ties pairing, device trust, rate limiting, and token issuance together —
/// the single entry point a station's HTTP layer calls into for C8.
pub struct SessionManager {
    codes: PairingCodeStore,
    devices: DeviceStore,
    rate_limiter: RateLimiter,
    actions: ActionLog,
    session_ttl_secs: i64,
}

impl SessionManager {
    pub fn open(db: &sled::Db) -> Result<Self, SessionError> {
        Ok(Self {
            codes: PairingCodeStore::open(db)?,
            devices: DeviceStore::open(db)?,
            rate_limiter: RateLimiter::open(db, RATE_LIMIT_ATTEMPTS as usize, RATE_LIMIT_WINDOW_SECS as i64)?,
            actions: ActionLog::open(db)?,
            session_ttl_secs: SESSION_TOKEN_TTL_SECS,
        })
    }

    pub fn generate_pairing_code(
        &self,
        station_id: &str,
        created_by: &str,
        allowed_roles: Vec<String>,
        scopes: Vec<String>,
        now_ms: i64,
    ) -> Result<PairingCode, SessionError> {
        self.codes
            .generate(station_id, created_by, allowed_roles, scopes, PAIRING_CODE_TTL_SECS, now_ms)
    }

    /// Generate a pairing code with the fleet-wide default role/scope grant,
    /// for the common case of an operator pairing a device without picking
    /// a custom role list.
    pub fn generate_pairing_code_with_defaults(
        &self,
        station_id: &str,
        created_by: &str,
        now_ms: i64,
    ) -> Result<PairingCode, SessionError> {
        let allowed_roles = DEFAULT_ALLOWED_ROLES.iter().map(|s| s.to_string()).collect();
        let scopes = DEFAULT_MOBILE_SCOPES.iter().map(|s| s.to_string()).collect();
        self.generate_pairing_code(station_id, created_by, allowed_roles, scopes, now_ms)
    }

    /// Exchange a pairing code for a session token. Order matches the
    /// reference implementation: blacklist check, then rate limit, then code
    /// lookup/consumption, then device upsert, then token issuance.
    #[allow(clippy::too_many_arguments)]
    pub fn exchange_pairing_code(
        &self,
        keypair: &StationKeypair,
        code: &str,
        device_id: &str,
        device_name: Option<String>,
        staff_id: &str,
        staff_name: &str,
        requested_role: &str,
        ip_address: &str,
        user_agent: Option<String>,
        now_ms: i64,
    ) -> Result<ExchangeResult, SessionError> {
        if self.devices.is_blacklisted(device_id)? {
            return Err(SessionError::BlacklistedDevice);
        }
        if !self.rate_limiter.check_and_record(ip_address, now_ms)? {
            return Err(SessionError::RateLimited);
        }

        let consumed = self.codes.consume(code, device_id, now_ms)?;

        let role = if consumed.allowed_roles.iter().any(|r| r == requested_role) {
            requested_role.to_string()
        } else {
            consumed.allowed_roles[0].clone()
        };

        let device = self.devices.upsert_paired(
            device_id,
            device_name,
            staff_id,
            staff_name,
            &role,
            consumed.scopes.clone(),
            &consumed.station_id,
            Some(ip_address.to_string()),
            user_agent,
            now_ms,
        )?;

        let claims = SessionClaims {
            device_id: device.device_id.clone(),
            staff_id: device.staff_id.clone(),
            staff_name: device.staff_name.clone(),
            role: device.role.clone(),
            scopes: device.scopes.clone(),
            station_id: device.station_id.clone(),
            iat_ms: now_ms,
            exp_ms: now_ms + self.session_ttl_secs * 1000,
        };
        let access_token = SessionToken::issue(keypair, &claims)?;

        Ok(ExchangeResult {
            access_token,
            expires_in_secs: self.session_ttl_secs,
            station_id: device.station_id,
            staff_id: device.staff_id,
            staff_name: device.staff_name,
            role: device.role,
            scopes: device.scopes,
        })
    }

    /// Verify a token's integrity/expiry, then confirm the device hasn't
    /// been revoked since the token was issued, then bump `last_seen`.
    pub fn verify_token(
        &self,
        verifying_key: &ed25519_dalek::VerifyingKey,
        token: &str,
        now_ms: i64,
    ) -> Result<SessionClaims, SessionError> {
        let claims = SessionToken::decode_and_verify(verifying_key, token, now_ms)?;

        if self.devices.is_revoked(&claims.device_id)? {
            return Err(SessionError::DeviceRevoked);
        }
        self.devices.update_last_seen(&claims.device_id, now_ms)?;
        Ok(claims)
    }

    pub fn revoke_device(&self, device_id: &str, reason: &str, revoked_by: &str, now_ms: i64) -> Result<bool, SessionError> {
        self.devices.revoke(device_id, reason, revoked_by, now_ms)
    }

    pub fn unrevoke_device(&self, device_id: &str) -> Result<bool, SessionError> {
        self.devices.unrevoke(device_id)
    }

    pub fn blacklist_device(&self, device_id: &str, reason: &str, blacklisted_by: &str) -> Result<(), SessionError> {
        self.devices.blacklist(device_id, reason, blacklisted_by)
    }

    pub fn unblacklist_device(&self, device_id: &str) -> Result<bool, SessionError> {
        self.devices.unblacklist(device_id)
    }

    pub fn get_paired_devices(&self, station_id: &str) -> Result<Vec<MobileDevice>, SessionError> {
        self.devices.list_for_station(station_id)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn log_action(
        &self,
        action_id: &str,
        action_type: &str,
        device_id: &str,
        staff_id: &str,
        station_id: &str,
        payload_json: &str,
        created_at_ms: i64,
        received_at_ms: i64,
    ) -> Result<bool, SessionError> {
        self.actions.record(
            action_id,
            action_type,
            device_id,
            staff_id,
            station_id,
            payload_json,
            created_at_ms,
            received_at_ms,
        )
    }

    pub fn cleanup_expired_codes(&self, now_ms: i64) -> Result<usize, SessionError> {
        self.codes.cleanup_stale(now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (tempfile::TempDir, SessionManager) {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let manager = SessionManager::open(&db).unwrap();
        (dir, manager)
    }

    #[test]
    fn exchange_succeeds_exactly_once_then_fails_on_second_attempt() {
        let (_dir, manager) = manager();
        let keypair = StationKeypair::generate();

        let pairing = manager
            .generate_pairing_code("TC-01", "admin", vec!["nurse".into(), "doctor".into()], vec!["mirs:equipment:read".into()], 0)
            .unwrap();

        let result = manager
            .exchange_pairing_code(&keypair, &pairing.code, "dev-1", None, "S1", "Nurse", "nurse", "1.2.3.4", None, 1_000)
            .unwrap();
        assert_eq!(result.role, "nurse");
        assert_eq!(result.station_id, "TC-01");

        let err = manager
            .exchange_pairing_code(&keypair, &pairing.code, "dev-2", None, "S2", "Doctor", "doctor", "5.6.7.8", None, 2_000)
            .unwrap_err();
        assert!(matches!(err, SessionError::CodeUsed));
    }

    #[test]
    fn requested_role_outside_allowed_list_is_narrowed() {
        let (_dir, manager) = manager();
        let keypair = StationKeypair::generate();

        let pairing = manager
            .generate_pairing_code("TC-01", "admin", vec!["nurse".into()], vec![], 0)
            .unwrap();

        let result = manager
            .exchange_pairing_code(&keypair, &pairing.code, "dev-1", None, "S1", "Nurse", "admin", "1.2.3.4", None, 1_000)
            .unwrap();
        assert_eq!(result.role, "nurse");
    }

    #[test]
    fn blacklisted_device_cannot_exchange_even_with_a_valid_code() {
        let (_dir, manager) = manager();
        let keypair = StationKeypair::generate();
        manager.blacklist_device("dev-1", "stolen", "admin").unwrap();

        let pairing = manager
            .generate_pairing_code("TC-01", "admin", vec!["nurse".into()], vec![], 0)
            .unwrap();

        let err = manager
            .exchange_pairing_code(&keypair, &pairing.code, "dev-1", None, "S1", "Nurse", "nurse", "1.2.3.4", None, 1_000)
            .unwrap_err();
        assert!(matches!(err, SessionError::BlacklistedDevice));
    }

    #[test]
    fn revoked_device_token_is_rejected_before_expiry() {
        let (_dir, manager) = manager();
        let keypair = StationKeypair::generate();
        let pairing = manager
            .generate_pairing_code("TC-01", "admin", vec!["nurse".into()], vec![], 0)
            .unwrap();
        let result = manager
            .exchange_pairing_code(&keypair, &pairing.code, "dev-1", None, "S1", "Nurse", "nurse", "1.2.3.4", None, 1_000)
            .unwrap();

        manager.revoke_device("dev-1", "lost phone", "admin", 2_000).unwrap();
        let err = manager
            .verify_token(&keypair.verifying_key(), &result.access_token, 3_000)
            .unwrap_err();
        assert!(matches!(err, SessionError::DeviceRevoked));
    }

    #[test]
    fn sixth_exchange_attempt_within_a_minute_is_rate_limited() {
        let (_dir, manager) = manager();
        let keypair = StationKeypair::generate();

        for i in 0..5 {
            let pairing = manager
                .generate_pairing_code("TC-01", "admin", vec!["nurse".into()], vec![], i * 1000)
                .unwrap();
            manager
                .exchange_pairing_code(&keypair, &pairing.code, &format!("dev-{i}"), None, "S1", "Nurse", "nurse", "1.2.3.4", None, i * 1000)
                .unwrap();
        }

        let pairing = manager
            .generate_pairing_code("TC-01", "admin", vec!["nurse".into()], vec![], 5_000)
            .unwrap();
        let err = manager
            .exchange_pairing_code(&keypair, &pairing.code, "dev-6", None, "S1", "Nurse", "nurse", "1.2.3.4", None, 5_000)
            .unwrap_err();
        assert!(matches!(err, SessionError::RateLimited));
    }
}
