pub mod builder;
pub mod envelope;
pub mod error;
pub mod replay;
pub mod verifier;

pub use builder::EnvelopeBuilder;
pub use envelope::{DecryptedPayload, EnvelopeHeader, SecureEnvelope, ENVELOPE_VERSION};
pub use error::EnvelopeError;
pub use replay::{ReplayProtector, ReplayStats};
pub use verifier::{EnvelopeVerifier, DEFAULT_EXPIRY_DAYS};
