pub mod error;
pub mod fingerprint;
pub mod keys;
pub mod seal;
pub mod trust;

pub use error::CryptoError;
pub use fingerprint::fingerprint as compute_fingerprint;
pub use keys::{
    encrypt_key_from_bytes, verify_key_from_bytes, verify_signature, GeneratedKeys, KeyManager,
    StationKeypair,
};
pub use trust::{TrustedKeyEntry, TrustedKeysRegistry};
