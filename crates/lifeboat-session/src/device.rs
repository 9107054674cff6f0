use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// A mobile device that has completed pairing at least once. Revocation and
/// blacklisting are tracked independently: a revoked device can be
/// unrevoked, a blacklisted device cannot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobileDevice {
    pub device_id: String,
    pub device_name: String,
    pub staff_id: String,
    pub staff_name: String,
    pub role: String,
    pub scopes: Vec<String>,
    pub station_id: String,
    pub paired_at_ms: i64,
    pub last_seen_ms: Option<i64>,
    pub revoked: bool,
    pub revoked_reason: Option<String>,
    pub revoked_by: Option<String>,
    pub blacklisted: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

pub struct DeviceStore {
    tree: sled::Tree,
}

impl DeviceStore {
    pub fn open(db: &sled::Db) -> Result<Self, SessionError> {
        Ok(Self { tree: db.open_tree("session_devices")? })
    }

    pub fn get(&self, device_id: &str) -> Result<Option<MobileDevice>, SessionError> {
        match self.tree.get(device_id.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&self, device: &MobileDevice) -> Result<(), SessionError> {
        let bytes = bincode::serialize(device)?;
        self.tree.insert(device.device_id.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn is_blacklisted(&self, device_id: &str) -> Result<bool, SessionError> {
        Ok(self.get(device_id)?.map(|d| d.blacklisted).unwrap_or(false))
    }

    pub fn is_revoked(&self, device_id: &str) -> Result<bool, SessionError> {
        Ok(self.get(device_id)?.map(|d| d.revoked).unwrap_or(false))
    }

    /// Insert a fresh pairing record or refresh an existing one, clearing any
    /// prior revocation — a re-pair through a valid code is a trust reset,
    /// not a continuation of a revoked session.
    #[allow(clippy::too_many_arguments)]
    pub fn upsert_paired(
        &self,
        device_id: &str,
        device_name: Option<String>,
        staff_id: &str,
        staff_name: &str,
        role: &str,
        scopes: Vec<String>,
        station_id: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
        now_ms: i64,
    ) -> Result<MobileDevice, SessionError> {
        let name = device_name.unwrap_or_else(|| format!("Device-{}", &device_id[..device_id.len().min(8)]));
        let device = MobileDevice {
            device_id: device_id.to_string(),
            device_name: name,
            staff_id: staff_id.to_string(),
            staff_name: staff_name.to_string(),
            role: role.to_string(),
            scopes,
            station_id: station_id.to_string(),
            paired_at_ms: now_ms,
            last_seen_ms: None,
            revoked: false,
            revoked_reason: None,
            revoked_by: None,
            blacklisted: false,
            ip_address,
            user_agent,
        };
        self.put(&device)?;
        Ok(device)
    }

    pub fn update_last_seen(&self, device_id: &str, now_ms: i64) -> Result<(), SessionError> {
        if let Some(mut device) = self.get(device_id)? {
            device.last_seen_ms = Some(now_ms);
            self.put(&device)?;
        }
        Ok(())
    }

    /// Revoke a paired device. Refuses if already blacklisted — blacklisting
    /// is the stronger, operator-permanent state and must not be papered
    /// over by a plain revoke.
    pub fn revoke(&self, device_id: &str, reason: &str, revoked_by: &str, now_ms: i64) -> Result<bool, SessionError> {
        let Some(mut device) = self.get(device_id)? else { return Ok(false) };
        if device.blacklisted {
            return Ok(false);
        }
        device.revoked = true;
        device.revoked_reason = Some(reason.to_string());
        device.revoked_by = Some(revoked_by.to_string());
        let _ = now_ms;
        self.put(&device)?;
        Ok(true)
    }

    pub fn unrevoke(&self, device_id: &str) -> Result<bool, SessionError> {
        let Some(mut device) = self.get(device_id)? else { return Ok(false) };
        if device.blacklisted || !device.revoked {
            return Ok(false);
        }
        device.revoked = false;
        device.revoked_reason = None;
        device.revoked_by = None;
        self.put(&device)?;
        Ok(true)
    }

    /// Permanently block a device_id. Works even if the device never
    /// completed pairing, so an operator can pre-empt a known-bad device_id.
    pub fn blacklist(&self, device_id: &str, reason: &str, blacklisted_by: &str) -> Result<(), SessionError> {
        let mut device = self.get(device_id)?.unwrap_or(MobileDevice {
            device_id: device_id.to_string(),
            device_name: format!("Blacklisted-{}", &device_id[..device_id.len().min(8)]),
            staff_id: "BLOCKED".to_string(),
            staff_name: "blocked".to_string(),
            role: "blocked".to_string(),
            scopes: Vec::new(),
            station_id: "N/A".to_string(),
            paired_at_ms: 0,
            last_seen_ms: None,
            revoked: false,
            revoked_reason: None,
            revoked_by: None,
            blacklisted: false,
            ip_address: None,
            user_agent: None,
        });
        device.blacklisted = true;
        device.revoked = true;
        device.revoked_reason = Some(reason.to_string());
        device.revoked_by = Some(blacklisted_by.to_string());
        self.put(&device)
    }

    pub fn unblacklist(&self, device_id: &str) -> Result<bool, SessionError> {
        let Some(mut device) = self.get(device_id)? else { return Ok(false) };
        if !device.blacklisted {
            return Ok(false);
        }
        device.blacklisted = false;
        device.revoked = false;
        device.revoked_reason = None;
        device.revoked_by = None;
        self.put(&device)?;
        Ok(true)
    }

    pub fn list_for_station(&self, station_id: &str) -> Result<Vec<MobileDevice>, SessionError> {
        let mut out = Vec::new();
        for item in self.tree.iter() {
            let (_, bytes) = item?;
            let device: MobileDevice = bincode::deserialize(&bytes)?;
            if device.station_id == station_id {
                out.push(device);
            }
        }
        out.sort_by_key(|d| d.paired_at_ms);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, DeviceStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let store = DeviceStore::open(&db).unwrap();
        (dir, store)
    }

    #[test]
    fn revoked_device_rejects_unrevoke_only_blacklist_is_permanent() {
        let (_dir, store) = store();
        store
            .upsert_paired("dev-1", None, "S1", "Nurse", "nurse", vec![], "TC-01", None, None, 0)
            .unwrap();

        assert!(store.revoke("dev-1", "lost phone", "admin", 1_000).unwrap());
        assert!(store.is_revoked("dev-1").unwrap());
        assert!(store.unrevoke("dev-1").unwrap());
        assert!(!store.is_revoked("dev-1").unwrap());
    }

    #[test]
    fn blacklist_prevents_unrevoke_and_further_revoke() {
        let (_dir, store) = store();
        store
            .upsert_paired("dev-1", None, "S1", "Nurse", "nurse", vec![], "TC-01", None, None, 0)
            .unwrap();

        store.blacklist("dev-1", "stolen", "admin").unwrap();
        assert!(store.is_blacklisted("dev-1").unwrap());
        assert!(!store.unrevoke("dev-1").unwrap());
        assert!(!store.revoke("dev-1", "again", "admin", 2_000).unwrap());
    }

    #[test]
    fn blacklist_can_preempt_a_device_that_never_paired() {
        let (_dir, store) = store();
        store.blacklist("dev-never-paired", "known bad actor", "admin").unwrap();
        assert!(store.is_blacklisted("dev-never-paired").unwrap());
    }

    #[test]
    fn unblacklist_clears_both_flags() {
        let (_dir, store) = store();
        store
            .upsert_paired("dev-1", None, "S1", "Nurse", "nurse", vec![], "TC-01", None, None, 0)
            .unwrap();
        store.blacklist("dev-1", "mistaken", "admin").unwrap();
        assert!(store.unblacklist("dev-1").unwrap());
        assert!(!store.is_blacklisted("dev-1").unwrap());
        assert!(!store.is_revoked("dev-1").unwrap());
    }
}
