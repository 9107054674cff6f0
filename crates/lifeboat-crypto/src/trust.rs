use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// One entry in a station's trusted-peer registry: the peer's public key
/// material and when it was added. Mirrors `trusted_keys.json` in the
/// reference deployment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrustedKeyEntry {
    pub station_id: String,
    pub signing_public_key_b64: String,
    pub encrypt_public_key_b64: String,
    pub fingerprint: String,
    pub added_at: DateTime<Utc>,
}

/// The set of stations this station will accept envelopes from. Persisted as
/// a single JSON file, written atomically (temp file + rename) so a crash
/// mid-write never leaves a truncated registry behind.
pub struct TrustedKeysRegistry {
    path: PathBuf,
    entries: HashMap<String, TrustedKeyEntry>,
}

impl TrustedKeysRegistry {
    pub fn load_or_empty(path: impl Into<PathBuf>) -> Result<Self, CryptoError> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            HashMap::new()
        };
        Ok(Self { path, entries })
    }

    fn persist(&self) -> Result<(), CryptoError> {
        let serialized = serde_json::to_string_pretty(&self.entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&tmp_path, serialized)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    pub fn add_trusted_station(&mut self, entry: TrustedKeyEntry) -> Result<(), CryptoError> {
        self.entries.insert(entry.station_id.clone(), entry);
        self.persist()
    }

    pub fn get(&self, station_id: &str) -> Option<&TrustedKeyEntry> {
        self.entries.get(station_id)
    }

    pub fn is_trusted(&self, station_id: &str) -> bool {
        self.entries.contains_key(station_id)
    }

    pub fn remove_trusted_station(&mut self, station_id: &str) -> Result<bool, CryptoError> {
        let removed = self.entries.remove(station_id).is_some();
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn list_trusted_stations(&self) -> Vec<&TrustedKeyEntry> {
        self.entries.values().collect()
    }
}
