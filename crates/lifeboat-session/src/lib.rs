pub mod actions;
pub mod device;
pub mod error;
pub mod manager;
pub mod pairing;
pub mod ratelimit;
pub mod token;

pub use actions::{ActionLog, ActionRecord};
pub use device::{DeviceStore, MobileDevice};
pub use error::SessionError;
pub use manager::{ExchangeResult, SessionManager};
pub use pairing::{PairingCode, PairingCodeStore};
pub use ratelimit::RateLimiter;
pub use token::{SessionClaims, SessionToken};
