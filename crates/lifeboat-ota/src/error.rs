use thiserror::Error;

/// Every early-exit outcome a tick can report, plus the genuine failure
/// modes. The non-error outcomes (`UpToDate`, `Skipped`, `WaitActiveCases`)
/// are folded into this type too, since the scheduler's caller (a log line,
/// a status endpoint) wants to branch on all of them uniformly.
#[derive(Debug, Error)]
pub enum OtaError {
    #[error("open cases block update: {0} case(s) in progress")]
    WaitActiveCases(usize),

    #[error("time gate has not passed; clock attestation required")]
    TimeInvalid,

    #[error("system load too high for an update cycle")]
    HighLoad,

    #[error("already up to date (local {local}, latest {latest})")]
    UpToDate { local: String, latest: String },

    #[error("version {0} is on the skip-list")]
    Skipped(String),

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("signature verification failed for downloaded package")]
    SignatureInvalid,

    #[error("sha256 mismatch: expected {expected}, got {got}")]
    HashMismatch { expected: String, got: String },

    #[error("staging new version failed: {0}")]
    StageFailed(String),

    #[error("atomic swap failed: {0}")]
    SwapFailed(String),

    #[error("post-swap health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("network error: {0}")]
    Network(String),
}

impl From<sled::Error> for OtaError {
    fn from(e: sled::Error) -> Self {
        OtaError::Storage(e.to_string())
    }
}

impl From<reqwest::Error> for OtaError {
    fn from(e: reqwest::Error) -> Self {
        OtaError::Network(e.to_string())
    }
}
