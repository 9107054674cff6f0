use ed25519_dalek::{Signature, VerifyingKey};
use lifeboat_core::constants::DEFAULT_ENVELOPE_EXPIRY_DAYS;
use lifeboat_crypto::{KeyManager, TrustedKeysRegistry};

use crate::envelope::{DecryptedPayload, SecureEnvelope};
use crate::error::EnvelopeError;
use crate::replay::{ReplayProtector, ReplayStats};

pub const DEFAULT_EXPIRY_DAYS: i64 = DEFAULT_ENVELOPE_EXPIRY_DAYS;

/// Verifies and decrypts inbound envelopes in a fixed order: trust, replay,
/// signature, decryption. Each step is a distinct failure the caller can act
/// on differently (drop silently vs. alert vs. quarantine), so the pipeline
/// never collapses them into one generic "invalid envelope" error.
pub struct EnvelopeVerifier<'a> {
    station_id: String,
    key_manager: &'a KeyManager,
    trusted: &'a TrustedKeysRegistry,
    replay: &'a ReplayProtector,
    expiry_days: i64,
}

impl<'a> EnvelopeVerifier<'a> {
    pub fn new(
        station_id: impl Into<String>,
        key_manager: &'a KeyManager,
        trusted: &'a TrustedKeysRegistry,
        replay: &'a ReplayProtector,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            key_manager,
            trusted,
            replay,
            expiry_days: DEFAULT_EXPIRY_DAYS,
        }
    }

    pub fn with_expiry_days(mut self, days: i64) -> Self {
        self.expiry_days = days;
        self
    }

    /// `now_secs` is unix seconds, matching the envelope header's timestamp.
    pub fn verify_and_decrypt(
        &self,
        envelope: &SecureEnvelope,
        skip_replay_check: bool,
        now_secs: i64,
    ) -> Result<DecryptedPayload, EnvelopeError> {
        self.verify_trust(envelope)?;
        if !skip_replay_check {
            self.verify_replay(envelope, now_secs)?;
        }
        self.verify_signature(envelope)?;
        let payload = self.decrypt_payload(envelope)?;

        self.replay.mark_processed(
            &envelope.envelope_id.to_string(),
            &envelope.header.sender_id,
            envelope.header.data_type,
            now_secs * 1000,
        )?;

        Ok(payload)
    }

    fn verify_trust(&self, envelope: &SecureEnvelope) -> Result<(), EnvelopeError> {
        if envelope.header.recipient_id != self.station_id {
            return Err(EnvelopeError::RecipientMismatch {
                recipient: envelope.header.recipient_id.clone(),
                expected: self.station_id.clone(),
            });
        }
        if !self.trusted.is_trusted(&envelope.header.sender_id) {
            return Err(EnvelopeError::SenderNotTrusted(envelope.header.sender_id.clone()));
        }
        Ok(())
    }

    fn verify_replay(&self, envelope: &SecureEnvelope, now_secs: i64) -> Result<(), EnvelopeError> {
        let age_secs = now_secs - envelope.header.timestamp;
        let limit_secs = self.expiry_days * 24 * 60 * 60;
        if age_secs > limit_secs {
            return Err(EnvelopeError::Expired { age_ms: age_secs * 1000, limit_ms: limit_secs * 1000 });
        }
        let envelope_id = envelope.envelope_id.to_string();
        if self.replay.is_processed(&envelope_id)? {
            return Err(EnvelopeError::AlreadyProcessed(envelope_id));
        }
        Ok(())
    }

    fn verify_signature(&self, envelope: &SecureEnvelope) -> Result<(), EnvelopeError> {
        let entry = self
            .trusted
            .get(&envelope.header.sender_id)
            .ok_or_else(|| EnvelopeError::SenderNotTrusted(envelope.header.sender_id.clone()))?;

        let verifying_key_bytes = base64::Engine::decode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            &entry.signing_public_key_b64,
        )
        .map_err(|_| EnvelopeError::Malformed("signing_public_key_b64"))?;
        let verifying_key = VerifyingKey::from_bytes(
            verifying_key_bytes
                .as_slice()
                .try_into()
                .map_err(|_| EnvelopeError::Malformed("signing_public_key_b64"))?,
        )
        .map_err(|_| EnvelopeError::SignatureInvalid)?;

        let sig_bytes = base64::Engine::decode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            &envelope.signature,
        )
        .map_err(|_| EnvelopeError::Malformed("signature"))?;
        let signature =
            Signature::from_slice(&sig_bytes).map_err(|_| EnvelopeError::SignatureInvalid)?;

        let tbs = envelope.to_be_signed();
        ed25519_dalek::Verifier::verify(&verifying_key, tbs.as_bytes(), &signature)
            .map_err(|_| EnvelopeError::SignatureInvalid)
    }

    fn decrypt_payload(&self, envelope: &SecureEnvelope) -> Result<DecryptedPayload, EnvelopeError> {
        let keypair = self.key_manager.load_keypair()?;
        let entry = self
            .trusted
            .get(&envelope.header.sender_id)
            .ok_or_else(|| EnvelopeError::SenderNotTrusted(envelope.header.sender_id.clone()))?;

        let sender_encrypt_bytes = base64::Engine::decode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            &entry.encrypt_public_key_b64,
        )
        .map_err(|_| EnvelopeError::Malformed("encrypt_public_key_b64"))?;
        let sender_public = lifeboat_crypto::encrypt_key_from_bytes(&sender_encrypt_bytes)?;

        let plaintext = lifeboat_crypto::seal::open(
            keypair.encrypt_secret(),
            &sender_public,
            &envelope.payload_encrypted,
            &envelope.nonce,
        )
        .map_err(|_| EnvelopeError::DecryptionFailed)?;

        serde_json::from_slice(&plaintext).map_err(EnvelopeError::from)
    }

    pub fn replay_stats(&self) -> Result<ReplayStats, EnvelopeError> {
        self.replay.get_replay_stats()
    }

    pub fn cleanup_old_envelopes(&self, now_ms: i64, max_age_days: i64) -> Result<usize, EnvelopeError> {
        self.replay.cleanup_old_entries(now_ms, max_age_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::EnvelopeBuilder;
    use lifeboat_core::DataType;
    use lifeboat_crypto::TrustedKeyEntry;

    fn trust_entry(station_id: &str, kp: &lifeboat_crypto::StationKeypair) -> TrustedKeyEntry {
        TrustedKeyEntry {
            station_id: station_id.to_string(),
            signing_public_key_b64: base64::Engine::encode(
                &base64::engine::general_purpose::URL_SAFE_NO_PAD,
                kp.verifying_key().as_bytes(),
            ),
            encrypt_public_key_b64: base64::Engine::encode(
                &base64::engine::general_purpose::URL_SAFE_NO_PAD,
                kp.encrypt_public().as_bytes(),
            ),
            fingerprint: kp.fingerprint(),
            added_at: chrono::Utc::now(),
        }
    }

    /// `trusted_by_recipient` is STATION_B's registry (trusts the sender, for
    /// verification); `trusted_by_sender` is the sender's own registry
    /// (trusts STATION_B, so `EnvelopeBuilder::build` can look up its
    /// encrypt key).
    fn setup(
        dir: &std::path::Path,
    ) -> (
        KeyManager,
        KeyManager,
        TrustedKeysRegistry,
        TrustedKeysRegistry,
        sled::Db,
    ) {
        let sender_keys = KeyManager::new(dir.join("sender_keys"));
        sender_keys.generate_keys("STATION_A").unwrap();
        let recipient_keys = KeyManager::new(dir.join("recipient_keys"));
        recipient_keys.generate_keys("STATION_B").unwrap();

        let sender_kp = sender_keys.load_keypair().unwrap();
        let recipient_kp = recipient_keys.load_keypair().unwrap();

        let mut trusted_by_recipient = TrustedKeysRegistry::load_or_empty(dir.join("b_trusted.json")).unwrap();
        trusted_by_recipient
            .add_trusted_station(trust_entry("STATION_A", &sender_kp))
            .unwrap();

        let mut trusted_by_sender = TrustedKeysRegistry::load_or_empty(dir.join("a_trusted.json")).unwrap();
        trusted_by_sender
            .add_trusted_station(trust_entry("STATION_B", &recipient_kp))
            .unwrap();

        let db = sled::open(dir.join("db")).unwrap();
        (sender_keys, recipient_keys, trusted_by_recipient, trusted_by_sender, db)
    }

    #[test]
    fn full_pipeline_decrypts_a_trusted_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let (sender_keys, recipient_keys, trusted_by_recipient, trusted_by_sender, db) = setup(dir.path());

        let sender_kp = sender_keys.load_keypair().unwrap();
        let builder = EnvelopeBuilder::new("STATION_A", &sender_kp, &trusted_by_sender);

        let envelope = builder
            .build(
                serde_json::json!({"inventory": "42 units"}),
                "STATION_B",
                DataType::InventoryTransfer,
                1_000_000,
            )
            .unwrap();

        let replay = ReplayProtector::open(&db).unwrap();
        let verifier = EnvelopeVerifier::new("STATION_B", &recipient_keys, &trusted_by_recipient, &replay);

        let decrypted = verifier.verify_and_decrypt(&envelope, false, 1_000_100).unwrap();
        assert_eq!(decrypted.data["inventory"], "42 units");
    }

    #[test]
    fn replayed_envelope_is_rejected_on_second_delivery() {
        let dir = tempfile::tempdir().unwrap();
        let (sender_keys, recipient_keys, trusted_by_recipient, trusted_by_sender, db) = setup(dir.path());

        let sender_kp = sender_keys.load_keypair().unwrap();
        let builder = EnvelopeBuilder::new("STATION_A", &sender_kp, &trusted_by_sender);

        let envelope = builder
            .build(
                serde_json::json!({"x": 1}),
                "STATION_B",
                DataType::EventLog,
                1_000_000,
            )
            .unwrap();

        let replay = ReplayProtector::open(&db).unwrap();
        let verifier = EnvelopeVerifier::new("STATION_B", &recipient_keys, &trusted_by_recipient, &replay);

        verifier.verify_and_decrypt(&envelope, false, 1_000_100).unwrap();
        let second = verifier.verify_and_decrypt(&envelope, false, 1_000_200);
        assert!(matches!(second, Err(EnvelopeError::AlreadyProcessed(_))));
    }

    #[test]
    fn untrusted_sender_is_rejected_before_signature_check() {
        let dir = tempfile::tempdir().unwrap();
        let recipient_keys = KeyManager::new(dir.path().join("recipient_keys"));
        recipient_keys.generate_keys("STATION_B").unwrap();
        let untrusted_keys = KeyManager::new(dir.path().join("untrusted_keys"));
        untrusted_keys.generate_keys("STATION_X").unwrap();

        let recipient_kp = recipient_keys.load_keypair().unwrap();
        let untrusted_kp = untrusted_keys.load_keypair().unwrap();

        let mut trusted_by_sender = TrustedKeysRegistry::load_or_empty(dir.path().join("x_trusted.json")).unwrap();
        trusted_by_sender
            .add_trusted_station(trust_entry("STATION_B", &recipient_kp))
            .unwrap();
        let builder = EnvelopeBuilder::new("STATION_X", &untrusted_kp, &trusted_by_sender);

        let envelope = builder
            .build(serde_json::json!({}), "STATION_B", DataType::EventLog, 1_000_000)
            .unwrap();

        let trusted_by_recipient = TrustedKeysRegistry::load_or_empty(dir.path().join("b_trusted.json")).unwrap();
        let db = sled::open(dir.path().join("db")).unwrap();
        let replay = ReplayProtector::open(&db).unwrap();
        let verifier = EnvelopeVerifier::new("STATION_B", &recipient_keys, &trusted_by_recipient, &replay);

        let result = verifier.verify_and_decrypt(&envelope, false, 1_000_100);
        assert!(matches!(result, Err(EnvelopeError::SenderNotTrusted(_))));
    }
}
