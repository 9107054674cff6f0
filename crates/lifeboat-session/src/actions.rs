use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// A mobile-submitted action, recorded idempotently by `action_id`. Mirrors
/// the reference implementation's `mirs_mobile_actions` log and its
/// `ON CONFLICT(action_id) DO NOTHING` insert — a device retrying a
/// submission after a dropped response must not double-apply it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_id: String,
    pub action_type: String,
    pub device_id: String,
    pub staff_id: String,
    pub station_id: String,
    pub payload_json: String,
    pub created_at_ms: i64,
    pub received_at_ms: i64,
}

pub struct ActionLog {
    tree: sled::Tree,
}

impl ActionLog {
    pub fn open(db: &sled::Db) -> Result<Self, SessionError> {
        Ok(Self { tree: db.open_tree("session_mobile_actions")? })
    }

    /// Record an action. Returns `true` if this call inserted a new record,
    /// `false` if `action_id` was already present (a no-op retry).
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        action_id: &str,
        action_type: &str,
        device_id: &str,
        staff_id: &str,
        station_id: &str,
        payload_json: &str,
        created_at_ms: i64,
        received_at_ms: i64,
    ) -> Result<bool, SessionError> {
        if self.tree.contains_key(action_id.as_bytes())? {
            return Ok(false);
        }
        let record = ActionRecord {
            action_id: action_id.to_string(),
            action_type: action_type.to_string(),
            device_id: device_id.to_string(),
            staff_id: staff_id.to_string(),
            station_id: station_id.to_string(),
            payload_json: payload_json.to_string(),
            created_at_ms,
            received_at_ms,
        };
        let bytes = bincode::serialize(&record)?;
        // compare_and_swap closes the race between the contains_key check
        // above and this insert without needing a whole-tree transaction.
        let inserted = self
            .tree
            .compare_and_swap(action_id.as_bytes(), None as Option<&[u8]>, Some(bytes))?
            .is_ok();
        Ok(inserted)
    }

    pub fn get(&self, action_id: &str) -> Result<Option<ActionRecord>, SessionError> {
        match self.tree.get(action_id.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_the_same_action_id_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let log = ActionLog::open(&db).unwrap();

        let first = log
            .record("act-1", "DISPENSE", "dev-1", "S1", "TC-01", "{}", 0, 0)
            .unwrap();
        assert!(first);

        let second = log
            .record("act-1", "DISPENSE", "dev-1", "S1", "TC-01", "{}", 0, 100)
            .unwrap();
        assert!(!second);

        assert_eq!(log.get("act-1").unwrap().unwrap().received_at_ms, 0);
    }
}
