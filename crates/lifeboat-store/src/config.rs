use serde::{Deserialize, Serialize};

use crate::error::StoreError;

const CONFIG_KEY: &[u8] = b"system_config";

/// Per-station persistent identity and bookkeeping, stored as a single row
/// in the `meta` tree. `server_uuid` is generated once on first open and
/// never changes; it is the identity a peer station records in its trust
/// registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemConfig {
    pub server_uuid: String,
    pub schema_version: String,
    pub last_seen_wall_ms: i64,
    /// The latest `ts_device` ever observed on any ingested event, used by
    /// the time-validity gate to bound how far a station's wall clock may
    /// have drifted from the events it has actually seen.
    pub max_ts_device_ms: i64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            server_uuid: String::new(),
            schema_version: "1.0".to_string(),
            last_seen_wall_ms: 0,
            max_ts_device_ms: 0,
        }
    }
}

impl SystemConfig {
    fn fresh() -> Self {
        Self {
            server_uuid: uuid::Uuid::new_v4().to_string(),
            ..Self::default()
        }
    }
}

pub struct SystemConfigStore {
    meta: sled::Tree,
}

impl SystemConfigStore {
    pub fn open(db: &sled::Db) -> Result<Self, StoreError> {
        Ok(Self {
            meta: db.open_tree("meta")?,
        })
    }

    /// Load the config row, creating and persisting a fresh one on first run.
    pub fn get_or_init(&self) -> Result<SystemConfig, StoreError> {
        if let Some(bytes) = self.meta.get(CONFIG_KEY)? {
            return Ok(bincode::deserialize(&bytes)?);
        }
        let config = SystemConfig::fresh();
        self.put(&config)?;
        Ok(config)
    }

    fn put(&self, config: &SystemConfig) -> Result<(), StoreError> {
        let bytes = bincode::serialize(config)?;
        self.meta.insert(CONFIG_KEY, bytes)?;
        Ok(())
    }

    pub fn update_last_seen(&self, wall_ms: i64) -> Result<SystemConfig, StoreError> {
        let mut config = self.get_or_init()?;
        config.last_seen_wall_ms = wall_ms;
        self.put(&config)?;
        Ok(config)
    }

    /// Record `ts_device_ms` as the new high-water mark if it's later than
    /// anything seen before. A no-op otherwise, so replaying old events
    /// during a restore can't push the mark backwards.
    pub fn observe_ts_device_ms(&self, ts_device_ms: i64) -> Result<SystemConfig, StoreError> {
        let mut config = self.get_or_init()?;
        if ts_device_ms > config.max_ts_device_ms {
            config.max_ts_device_ms = ts_device_ms;
            self.put(&config)?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_uuid_is_stable_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();

        let first = SystemConfigStore::open(&db).unwrap().get_or_init().unwrap();
        let second = SystemConfigStore::open(&db).unwrap().get_or_init().unwrap();
        assert_eq!(first.server_uuid, second.server_uuid);
    }

    #[test]
    fn update_last_seen_persists() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let store = SystemConfigStore::open(&db).unwrap();

        store.update_last_seen(12345).unwrap();
        let reloaded = store.get_or_init().unwrap();
        assert_eq!(reloaded.last_seen_wall_ms, 12345);
    }

    #[test]
    fn observe_ts_device_ms_only_advances_the_high_water_mark() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let store = SystemConfigStore::open(&db).unwrap();

        store.observe_ts_device_ms(5000).unwrap();
        store.observe_ts_device_ms(2000).unwrap();
        let config = store.get_or_init().unwrap();
        assert_eq!(config.max_ts_device_ms, 5000);
    }
}
