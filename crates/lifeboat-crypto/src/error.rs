use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid signing key bytes")]
    InvalidSigningKey,

    #[error("invalid encrypt key bytes")]
    InvalidEncryptKey,

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("decryption failed; ciphertext may be corrupt or the sender key is wrong")]
    DecryptionFailed,

    #[error("unknown station: {0}")]
    UnknownStation(String),

    #[error("station {0} is already trusted")]
    AlreadyTrusted(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
