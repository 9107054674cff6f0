use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    // ── Trust ────────────────────────────────────────────────────────────────
    #[error("envelope addressed to {recipient}, this station is {expected}")]
    RecipientMismatch { recipient: String, expected: String },

    #[error("sender {0} is not a trusted station")]
    SenderNotTrusted(String),

    #[error("recipient {0} is not in the trusted-key registry")]
    UntrustedRecipient(String),

    // ── Replay / temporal ────────────────────────────────────────────────────
    #[error("envelope {0} already processed")]
    AlreadyProcessed(String),

    #[error("envelope expired: {age_ms}ms old, limit {limit_ms}ms")]
    Expired { age_ms: i64, limit_ms: i64 },

    // ── Integrity ────────────────────────────────────────────────────────────
    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("malformed envelope field: {0}")]
    Malformed(&'static str),

    // ── Storage / serialization ──────────────────────────────────────────────
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Crypto(#[from] lifeboat_crypto::CryptoError),
}

impl From<sled::Error> for EnvelopeError {
    fn from(e: sled::Error) -> Self {
        EnvelopeError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for EnvelopeError {
    fn from(e: serde_json::Error) -> Self {
        EnvelopeError::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for EnvelopeError {
    fn from(e: bincode::Error) -> Self {
        EnvelopeError::Serialization(e.to_string())
    }
}
