use thiserror::Error;

/// Error taxonomy shared by every lifeboat-* crate. Each downstream crate
/// defines its own `Error` enum for operation-specific failures and folds
/// this one in via `#[from]` where a failure bottoms out in core semantics.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Validation ───────────────────────────────────────────────────────────
    #[error("invalid station id: {0:?}")]
    InvalidStationId(String),

    #[error("malformed id: {0:?}")]
    MalformedId(String),

    #[error("malformed hlc value: {0:?}")]
    MalformedHlc(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("payload exceeds maximum size of {max} bytes (got {got})")]
    PayloadTooLarge { max: usize, got: usize },

    // ── Trust / auth ─────────────────────────────────────────────────────────
    #[error("recipient {0} is not this station")]
    RecipientMismatch(String),

    #[error("sender {0} is not a trusted station")]
    SenderNotTrusted(String),

    #[error("device {0} is blacklisted")]
    BlacklistedDevice(String),

    #[error("device {0} has been revoked")]
    DeviceRevoked(String),

    #[error("session token has expired")]
    TokenExpired,

    // ── Replay / temporal ────────────────────────────────────────────────────
    #[error("envelope {0} already processed")]
    AlreadyProcessed(String),

    #[error("envelope has expired (age exceeds replay window)")]
    EnvelopeExpired,

    #[error("timestamp is outside the accepted clock-skew window")]
    TimeInvalid,

    // ── Integrity ────────────────────────────────────────────────────────────
    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("payload hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch { expected: String, computed: String },

    #[error("decryption failed; payload may have been tampered with")]
    PayloadTampered,

    // ── Conflict ─────────────────────────────────────────────────────────────
    #[error("equipment unit {0} is already claimed")]
    UnitBusy(String),

    #[error("duplicate event id: {0}")]
    DuplicateEventId(String),

    // ── Transient I/O ────────────────────────────────────────────────────────
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // ── Capacity / load ──────────────────────────────────────────────────────
    #[error("rate limit exceeded: {attempts} attempts within {window_secs}s")]
    RateLimited { attempts: u32, window_secs: u64 },

    #[error("system under load; operation deferred")]
    SystemOverloaded,
}
