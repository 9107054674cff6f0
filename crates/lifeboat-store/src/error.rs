use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("duplicate event id: {0}")]
    DuplicateEventId(String),

    #[error("payload exceeds maximum size of {max} bytes (got {got})")]
    PayloadTooLarge { max: usize, got: usize },

    #[error("event not found: {0}")]
    EventNotFound(String),

    #[error("restore session not found: {0}")]
    SessionNotFound(String),

    #[error("restore session already closed: {0}")]
    SessionClosed(String),
}

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::Storage(e.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
