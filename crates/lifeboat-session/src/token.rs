use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::Signature;
use lifeboat_crypto::{verify_signature, StationKeypair};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Claims carried by a session token. Plays the role the reference
/// implementation gives a JWT payload, but signed with the station's own
/// Ed25519 key instead of a shared HMAC secret — a station never needs to
/// distribute a symmetric secret to verify its own tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub device_id: String,
    pub staff_id: String,
    pub staff_name: String,
    pub role: String,
    pub scopes: Vec<String>,
    pub station_id: String,
    pub iat_ms: i64,
    pub exp_ms: i64,
}

impl SessionClaims {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.exp_ms
    }
}

/// A signed session token: `base64url(claims_json).base64url(signature)`.
pub struct SessionToken;

impl SessionToken {
    pub fn issue(keypair: &StationKeypair, claims: &SessionClaims) -> Result<String, SessionError> {
        let payload_json = serde_json::to_vec(claims)?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload_json);
        let signature = keypair.sign(payload_b64.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());
        Ok(format!("{payload_b64}.{sig_b64}"))
    }

    /// Verify integrity and expiry only — caller is responsible for the
    /// device-revocation check and `last_seen` update that sit above this.
    pub fn decode_and_verify(
        verifying_key: &ed25519_dalek::VerifyingKey,
        token: &str,
        now_ms: i64,
    ) -> Result<SessionClaims, SessionError> {
        let (payload_b64, sig_b64) = token.split_once('.').ok_or(SessionError::TokenInvalid)?;

        let sig_bytes = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| SessionError::TokenInvalid)?;
        let sig_arr: [u8; 64] = sig_bytes.try_into().map_err(|_| SessionError::TokenInvalid)?;
        let signature = Signature::from_bytes(&sig_arr);

        verify_signature(verifying_key, payload_b64.as_bytes(), &signature)
            .map_err(|_| SessionError::TokenInvalid)?;

        let payload_json = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| SessionError::TokenInvalid)?;
        let claims: SessionClaims =
            serde_json::from_slice(&payload_json).map_err(|_| SessionError::TokenInvalid)?;

        if claims.is_expired(now_ms) {
            return Err(SessionError::TokenExpired);
        }
        Ok(claims)
    }
}
