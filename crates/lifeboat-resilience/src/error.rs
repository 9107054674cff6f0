use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResilienceError {
    #[error("equipment unit {0} is already claimed by {1}")]
    AlreadyClaimed(String, String),

    #[error("equipment unit {0} is not claimed")]
    NotClaimed(String),

    #[error("equipment unit {unit} is claimed by {holder}, not {requester}")]
    NotClaimHolder {
        unit: String,
        holder: String,
        requester: String,
    },

    #[error("equipment unit {0} is retired and cannot be claimed")]
    UnitRetired(String),

    #[error("capacity strategy {0:?} requires config that was not supplied")]
    MissingCapacityConfig(lifeboat_core::CapacityStrategy),
}
