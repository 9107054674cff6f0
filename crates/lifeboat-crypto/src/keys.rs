use std::fs;
use std::path::PathBuf;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::fingerprint::fingerprint;

const SIGNING_KEY_FILE: &str = "station.private";
const SIGNING_PUB_FILE: &str = "station.public";
const ENCRYPT_KEY_FILE: &str = "station.encrypt.private";
const ENCRYPT_PUB_FILE: &str = "station.encrypt.public";

/// A station's full keypair set: one Ed25519 pair for signing envelopes, one
/// X25519 pair for the NaCl-Box encryption layer. Mirrors the reference
/// station's on-disk four-file layout (`station.private`/`station.public`/
/// `station.encrypt.private`/`station.encrypt.public`).
pub struct StationKeypair {
    signing: SigningKey,
    encrypt: crypto_box::SecretKey,
}

impl StationKeypair {
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            signing: SigningKey::generate(&mut rng),
            encrypt: crypto_box::SecretKey::generate(&mut rng),
        }
    }

    pub fn from_raw(signing_bytes: [u8; 32], encrypt_bytes: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&signing_bytes),
            encrypt: crypto_box::SecretKey::from(encrypt_bytes),
        }
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    pub fn encrypt_secret(&self) -> &crypto_box::SecretKey {
        &self.encrypt
    }

    pub fn encrypt_public(&self) -> crypto_box::PublicKey {
        self.encrypt.public_key()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(self.verifying_key().as_bytes())
    }
}

/// Summary returned after generating a fresh keypair set, suitable for
/// printing to an operator or recording in a provisioning log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedKeys {
    pub station_id: String,
    pub signing_public_key_b64: String,
    pub encrypt_public_key_b64: String,
    pub fingerprint: String,
    pub generated_at: DateTime<Utc>,
}

/// Loads and persists a station's keypair from a directory of raw-bytes
/// files. Each file holds base64url-encoded key material, one key per file,
/// matching the reference station's convention of never bundling secret and
/// public material together.
pub struct KeyManager {
    base_dir: PathBuf,
}

impl KeyManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.base_dir.join(file)
    }

    fn write_key_file(&self, file: &str, bytes: &[u8]) -> Result<(), CryptoError> {
        fs::create_dir_all(&self.base_dir)?;
        let encoded = URL_SAFE_NO_PAD.encode(bytes);
        fs::write(self.path(file), encoded)?;
        Ok(())
    }

    fn read_key_bytes(&self, file: &str) -> Result<[u8; 32], CryptoError> {
        let encoded = fs::read_to_string(self.path(file))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|_| CryptoError::InvalidSigningKey)?;
        bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSigningKey)
    }

    /// Generate a fresh keypair set and write all four files at once.
    /// Matches the reference implementation's single provisioning step —
    /// a station never ends up with a signing key but no encrypt key.
    pub fn generate_keys(&self, station_id: &str) -> Result<GeneratedKeys, CryptoError> {
        let keypair = StationKeypair::generate();

        self.write_key_file(SIGNING_KEY_FILE, keypair.signing_key().as_bytes())?;
        self.write_key_file(SIGNING_PUB_FILE, keypair.verifying_key().as_bytes())?;
        self.write_key_file(ENCRYPT_KEY_FILE, keypair.encrypt_secret().as_bytes())?;
        self.write_key_file(ENCRYPT_PUB_FILE, keypair.encrypt_public().as_bytes())?;

        Ok(GeneratedKeys {
            station_id: station_id.to_string(),
            signing_public_key_b64: URL_SAFE_NO_PAD.encode(keypair.verifying_key().as_bytes()),
            encrypt_public_key_b64: URL_SAFE_NO_PAD.encode(keypair.encrypt_public().as_bytes()),
            fingerprint: keypair.fingerprint(),
            generated_at: Utc::now(),
        })
    }

    pub fn load_keypair(&self) -> Result<StationKeypair, CryptoError> {
        let signing_bytes = self.read_key_bytes(SIGNING_KEY_FILE)?;
        let encrypt_bytes = self.read_key_bytes(ENCRYPT_KEY_FILE)?;
        Ok(StationKeypair::from_raw(signing_bytes, encrypt_bytes))
    }

    pub fn load_verify_key(&self) -> Result<VerifyingKey, CryptoError> {
        let bytes = self.read_key_bytes(SIGNING_PUB_FILE)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidSigningKey)
    }

    pub fn load_encrypt_public(&self) -> Result<crypto_box::PublicKey, CryptoError> {
        let bytes = self.read_key_bytes(ENCRYPT_PUB_FILE)?;
        Ok(crypto_box::PublicKey::from(bytes))
    }

    pub fn keys_exist(&self) -> bool {
        [
            SIGNING_KEY_FILE,
            SIGNING_PUB_FILE,
            ENCRYPT_KEY_FILE,
            ENCRYPT_PUB_FILE,
        ]
        .iter()
        .all(|f| self.path(f).exists())
    }
}

/// Verify a detached Ed25519 signature against raw public key bytes.
pub fn verify_signature(
    verifying_key: &VerifyingKey,
    message: &[u8],
    signature: &Signature,
) -> Result<(), CryptoError> {
    verifying_key
        .verify(message, signature)
        .map_err(|_| CryptoError::InvalidSignature)
}

pub fn verify_key_from_bytes(bytes: &[u8]) -> Result<VerifyingKey, CryptoError> {
    let arr: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidSigningKey)?;
    VerifyingKey::from_bytes(&arr).map_err(|_| CryptoError::InvalidSigningKey)
}

pub fn encrypt_key_from_bytes(bytes: &[u8]) -> Result<crypto_box::PublicKey, CryptoError> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidEncryptKey)?;
    Ok(crypto_box::PublicKey::from(arr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn generate_then_load_round_trips_signing_key() {
        let dir = tempdir().unwrap();
        let manager = KeyManager::new(dir.path());
        let generated = manager.generate_keys("STATION_A").unwrap();
        assert!(manager.keys_exist());

        let keypair = manager.load_keypair().unwrap();
        let message = b"a test message";
        let sig = keypair.sign(message);
        assert!(verify_signature(&keypair.verifying_key(), message, &sig).is_ok());
        assert_eq!(keypair.fingerprint(), generated.fingerprint);
    }

    #[test]
    fn load_verify_key_matches_keypair_verifying_key() {
        let dir = tempdir().unwrap();
        let manager = KeyManager::new(dir.path());
        manager.generate_keys("STATION_A").unwrap();
        let keypair = manager.load_keypair().unwrap();
        let verify_key = manager.load_verify_key().unwrap();
        assert_eq!(verify_key.as_bytes(), keypair.verifying_key().as_bytes());
    }
}
