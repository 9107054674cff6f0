use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    // ---- Pairing ---------------------------------------------------
    #[error("pairing code not found or already expired")]
    CodeNotFound,
    #[error("pairing code has already been used")]
    CodeUsed,

    // ---- Trust / auth ------------------------------------------------
    #[error("device is blacklisted and cannot pair")]
    BlacklistedDevice,
    #[error("device access has been revoked")]
    DeviceRevoked,
    #[error("session token has expired")]
    TokenExpired,
    #[error("session token is malformed or fails signature verification")]
    TokenInvalid,

    // ---- Conflict / load ------------------------------------------------
    #[error("too many pairing attempts from this address, try again later")]
    RateLimited,

    // ---- Storage ------------------------------------------------
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<sled::Error> for SessionError {
    fn from(e: sled::Error) -> Self {
        SessionError::Storage(e.to_string())
    }
}

impl From<bincode::Error> for SessionError {
    fn from(e: bincode::Error) -> Self {
        SessionError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::Serialization(e.to_string())
    }
}
