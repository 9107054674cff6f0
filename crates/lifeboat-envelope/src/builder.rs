use lifeboat_core::{DataType, EnvelopeId};
use lifeboat_crypto::{StationKeypair, TrustedKeysRegistry};

use crate::envelope::{DecryptedPayload, EnvelopeHeader, SecureEnvelope, ENVELOPE_VERSION};
use crate::error::EnvelopeError;

/// Builds outgoing envelopes on behalf of one station. Holds the station's
/// own keypair and its trusted-peer registry — a station never encrypts to
/// a key it hasn't already been told to trust, so the registry lookup is
/// part of the build itself, not left to the caller.
pub struct EnvelopeBuilder<'a> {
    station_id: String,
    keypair: &'a StationKeypair,
    trusted: &'a TrustedKeysRegistry,
}

impl<'a> EnvelopeBuilder<'a> {
    pub fn new(
        station_id: impl Into<String>,
        keypair: &'a StationKeypair,
        trusted: &'a TrustedKeysRegistry,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            keypair,
            trusted,
        }
    }

    /// Encrypt-then-sign `payload` for `recipient_id`. The payload is first
    /// wrapped with its own schema version and creation time so a decrypted
    /// envelope is self-describing even outside the store that produced it.
    /// `now_secs` is unix seconds, per the envelope header's wire contract.
    /// Fails `UntrustedRecipient` if `recipient_id` has no entry in the
    /// trusted-key registry — a station never seals a payload to a key it
    /// hasn't been told to trust.
    pub fn build(
        &self,
        payload: serde_json::Value,
        recipient_id: &str,
        data_type: DataType,
        now_secs: i64,
    ) -> Result<SecureEnvelope, EnvelopeError> {
        let recipient_entry = self
            .trusted
            .get(recipient_id)
            .ok_or_else(|| EnvelopeError::UntrustedRecipient(recipient_id.to_string()))?;

        let recipient_encrypt_bytes = base64::Engine::decode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            &recipient_entry.encrypt_public_key_b64,
        )
        .map_err(|_| EnvelopeError::Malformed("encrypt_public_key_b64"))?;
        let recipient_encrypt_public = lifeboat_crypto::encrypt_key_from_bytes(&recipient_encrypt_bytes)?;

        let decrypted = DecryptedPayload {
            schema_version: "1.0".to_string(),
            data_type,
            data: payload,
            created_at_ms: now_secs * 1000,
        };
        let plaintext = serde_json::to_vec(&decrypted)?;

        let sealed = lifeboat_crypto::seal::seal(
            self.keypair.encrypt_secret(),
            &recipient_encrypt_public,
            &plaintext,
        )?;

        let envelope_id = EnvelopeId::generate();
        let header = EnvelopeHeader {
            version: ENVELOPE_VERSION.to_string(),
            sender_id: self.station_id.clone(),
            recipient_id: recipient_id.to_string(),
            timestamp: now_secs,
            data_type,
        };

        let mut envelope = SecureEnvelope {
            envelope_id,
            header,
            payload_encrypted: sealed.ciphertext_b64,
            nonce: sealed.nonce_b64,
            signature: String::new(),
        };

        let tbs = envelope.to_be_signed();
        let signature = self.keypair.sign(tbs.as_bytes());
        envelope.signature =
            base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, signature.to_bytes());

        Ok(envelope)
    }
}
