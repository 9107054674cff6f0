pub mod constants;
pub mod error;
pub mod event;
pub mod types;

pub use error::CoreError;
pub use event::{ActorContext, Event, EventDraft};
pub use types::{
    CapacityStrategy, CaseStatus, DataType, EntityType, EnvelopeId, EquipmentStatus, EventId,
    HlcValue, ResilienceLevel, StationId,
};
