use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// A one-time 6-digit code that a hub operator hands to a mobile device to
/// complete pairing. Scoped to a station and a narrow set of roles/scopes so
/// the issuing operator controls exactly what the paired device can do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingCode {
    pub code: String,
    pub station_id: String,
    pub created_by: String,
    pub allowed_roles: Vec<String>,
    pub scopes: Vec<String>,
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
    pub used: bool,
    pub used_by_device: Option<String>,
}

impl PairingCode {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

fn generate_code() -> String {
    let n: u32 = rand::rngs::OsRng.gen_range(0..1_000_000);
    format!("{n:06}")
}

/// Persistent store of pairing codes, keyed by the code itself. Unlike the
/// reference implementation's in-process rate-limit table, everything here
/// lives in `sled` so a restart doesn't forget which codes are outstanding.
pub struct PairingCodeStore {
    tree: sled::Tree,
}

impl PairingCodeStore {
    pub fn open(db: &sled::Db) -> Result<Self, SessionError> {
        Ok(Self { tree: db.open_tree("session_pairing_codes")? })
    }

    fn get_raw(&self, code: &str) -> Result<Option<PairingCode>, SessionError> {
        match self.tree.get(code.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&self, entry: &PairingCode) -> Result<(), SessionError> {
        let bytes = bincode::serialize(entry)?;
        self.tree.insert(entry.code.as_bytes(), bytes)?;
        Ok(())
    }

    /// Generate a fresh, unique, unexpired code valid for `expires_in_secs`
    /// seconds (5 minutes by default per the pairing flow).
    #[allow(clippy::too_many_arguments)]
    pub fn generate(
        &self,
        station_id: &str,
        created_by: &str,
        allowed_roles: Vec<String>,
        scopes: Vec<String>,
        expires_in_secs: i64,
        now_ms: i64,
    ) -> Result<PairingCode, SessionError> {
        let code = loop {
            let candidate = generate_code();
            if self.get_raw(&candidate)?.is_none() {
                break candidate;
            }
        };

        let entry = PairingCode {
            code,
            station_id: station_id.to_string(),
            created_by: created_by.to_string(),
            allowed_roles,
            scopes,
            created_at_ms: now_ms,
            expires_at_ms: now_ms + expires_in_secs * 1000,
            used: false,
            used_by_device: None,
        };
        self.put(&entry)?;
        Ok(entry)
    }

    /// Atomically look up an unexpired, unused code and mark it used. Fails
    /// with `CodeUsed` on a second attempt against the same code and
    /// `CodeNotFound` once it has expired or never existed — matching the
    /// scenario that exchanging a code succeeds exactly once.
    pub fn consume(&self, code: &str, device_id: &str, now_ms: i64) -> Result<PairingCode, SessionError> {
        let mut result = Err(SessionError::CodeNotFound);
        self.tree
            .transaction(|tx| {
                let Some(bytes) = tx.get(code.as_bytes())? else {
                    result = Err(SessionError::CodeNotFound);
                    return Ok(());
                };
                let mut entry: PairingCode = bincode::deserialize(&bytes).unwrap();

                if entry.is_expired(now_ms) {
                    result = Err(SessionError::CodeNotFound);
                    return Ok(());
                }
                if entry.used {
                    result = Err(SessionError::CodeUsed);
                    return Ok(());
                }

                entry.used = true;
                entry.used_by_device = Some(device_id.to_string());
                let encoded = bincode::serialize(&entry).unwrap();
                tx.insert(code.as_bytes(), encoded)?;
                result = Ok(entry);
                Ok(())
            })
            .map_err(|e: sled::transaction::TransactionError<sled::Error>| {
                SessionError::Storage(e.to_string())
            })?;
        result
    }

    /// Drop expired or already-used codes. Mirrors the reference
    /// implementation's startup cleanup sweep.
    pub fn cleanup_stale(&self, now_ms: i64) -> Result<usize, SessionError> {
        let mut removed = 0;
        for item in self.tree.iter() {
            let (key, bytes) = item?;
            let entry: PairingCode = bincode::deserialize(&bytes)?;
            if entry.used || entry.is_expired(now_ms) {
                self.tree.remove(key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, PairingCodeStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let store = PairingCodeStore::open(&db).unwrap();
        (dir, store)
    }

    #[test]
    fn generated_code_is_six_digits_and_unused() {
        let (_dir, store) = store();
        let entry = store
            .generate("TC-01", "admin", vec!["nurse".into()], vec!["mirs:equipment:read".into()], 300, 0)
            .unwrap();
        assert_eq!(entry.code.len(), 6);
        assert!(!entry.used);
    }

    #[test]
    fn consume_succeeds_exactly_once_then_fails_code_used() {
        let (_dir, store) = store();
        let entry = store
            .generate("TC-01", "admin", vec!["nurse".into()], vec![], 300, 0)
            .unwrap();

        let consumed = store.consume(&entry.code, "device-1", 1_000).unwrap();
        assert_eq!(consumed.used_by_device.as_deref(), Some("device-1"));

        let err = store.consume(&entry.code, "device-2", 2_000).unwrap_err();
        assert!(matches!(err, SessionError::CodeUsed));
    }

    #[test]
    fn consume_after_expiry_fails_code_not_found() {
        let (_dir, store) = store();
        let entry = store
            .generate("TC-01", "admin", vec!["nurse".into()], vec![], 300, 0)
            .unwrap();

        let err = store.consume(&entry.code, "device-1", 10 * 60 * 1000).unwrap_err();
        assert!(matches!(err, SessionError::CodeNotFound));
    }

    #[test]
    fn cleanup_stale_drops_used_and_expired_codes() {
        let (_dir, store) = store();
        let used = store
            .generate("TC-01", "admin", vec!["nurse".into()], vec![], 300, 0)
            .unwrap();
        store.consume(&used.code, "device-1", 1_000).unwrap();
        let fresh = store
            .generate("TC-01", "admin", vec!["nurse".into()], vec![], 300, 1_000)
            .unwrap();

        let removed = store.cleanup_stale(2_000).unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_raw(&fresh.code).unwrap().is_some());
    }
}
