use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use lifeboat_core::DataType;

use crate::error::EnvelopeError;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ProcessedRecord {
    sender_id: String,
    data_type: DataType,
    processed_at_ms: i64,
}

/// A snapshot of the replay-protection store's contents. `oldest`/`newest`
/// are `None` when the store is empty; `per_sender` counts records by the
/// sender that produced them, so an operator can spot one station flooding
/// the log before it's worth a full audit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplayStats {
    pub total_records: usize,
    pub oldest_processed_at_ms: Option<i64>,
    pub newest_processed_at_ms: Option<i64>,
    pub per_sender: HashMap<String, usize>,
}

/// Tracks which envelope ids have already been accepted, so a resent or
/// physically re-delivered `.xirs` file is rejected instead of applied
/// twice. Persisted so the guard survives a restart.
pub struct ReplayProtector {
    processed: sled::Tree,
}

impl ReplayProtector {
    pub fn open(db: &sled::Db) -> Result<Self, EnvelopeError> {
        Ok(Self {
            processed: db.open_tree("processed_envelopes")?,
        })
    }

    pub fn is_processed(&self, envelope_id: &str) -> Result<bool, EnvelopeError> {
        Ok(self.processed.contains_key(envelope_id.as_bytes())?)
    }

    pub fn mark_processed(
        &self,
        envelope_id: &str,
        sender_id: &str,
        data_type: DataType,
        now_ms: i64,
    ) -> Result<(), EnvelopeError> {
        let record = ProcessedRecord {
            sender_id: sender_id.to_string(),
            data_type,
            processed_at_ms: now_ms,
        };
        let bytes = bincode::serialize(&record)?;
        self.processed.insert(envelope_id.as_bytes(), bytes)?;
        Ok(())
    }

    /// Drop records older than `max_age_days`. Run periodically so the
    /// replay store doesn't grow forever; safe to run at any time since a
    /// pruned record only re-opens a (now implausible) replay window.
    pub fn cleanup_old_entries(&self, now_ms: i64, max_age_days: i64) -> Result<usize, EnvelopeError> {
        let cutoff_ms = now_ms - max_age_days * 24 * 60 * 60 * 1000;
        let mut removed = 0;
        let mut stale_keys = Vec::new();
        for item in self.processed.iter() {
            let (key, bytes) = item?;
            let record: ProcessedRecord = bincode::deserialize(&bytes)?;
            if record.processed_at_ms < cutoff_ms {
                stale_keys.push(key);
            }
        }
        for key in stale_keys {
            self.processed.remove(key)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Count, oldest/newest `processed_at_ms`, and a per-sender breakdown —
    /// walks the full tree, so this is for operator/admin reporting, not a
    /// hot path.
    pub fn get_replay_stats(&self) -> Result<ReplayStats, EnvelopeError> {
        let mut stats = ReplayStats {
            total_records: self.processed.len(),
            ..Default::default()
        };
        for item in self.processed.iter() {
            let (_, bytes) = item?;
            let record: ProcessedRecord = bincode::deserialize(&bytes)?;
            stats.oldest_processed_at_ms = Some(
                stats
                    .oldest_processed_at_ms
                    .map_or(record.processed_at_ms, |o| o.min(record.processed_at_ms)),
            );
            stats.newest_processed_at_ms = Some(
                stats
                    .newest_processed_at_ms
                    .map_or(record.processed_at_ms, |n| n.max(record.processed_at_ms)),
            );
            *stats.per_sender.entry(record.sender_id).or_insert(0) += 1;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_then_is_processed() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let protector = ReplayProtector::open(&db).unwrap();

        assert!(!protector.is_processed("env-1").unwrap());
        protector
            .mark_processed("env-1", "STATION_A", DataType::EventLog, 1000)
            .unwrap();
        assert!(protector.is_processed("env-1").unwrap());
    }

    #[test]
    fn cleanup_prunes_entries_older_than_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let protector = ReplayProtector::open(&db).unwrap();

        protector
            .mark_processed("old", "STATION_A", DataType::EventLog, 0)
            .unwrap();
        protector
            .mark_processed("recent", "STATION_A", DataType::EventLog, 1_000_000_000_000)
            .unwrap();

        let removed = protector.cleanup_old_entries(1_000_000_000_000, 30).unwrap();
        assert_eq!(removed, 1);
        assert!(!protector.is_processed("old").unwrap());
        assert!(protector.is_processed("recent").unwrap());
    }

    #[test]
    fn replay_stats_reports_span_and_per_sender_breakdown() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let protector = ReplayProtector::open(&db).unwrap();

        let empty = protector.get_replay_stats().unwrap();
        assert_eq!(empty.total_records, 0);
        assert_eq!(empty.oldest_processed_at_ms, None);

        protector
            .mark_processed("env-1", "STATION_A", DataType::EventLog, 1000)
            .unwrap();
        protector
            .mark_processed("env-2", "STATION_A", DataType::EventLog, 3000)
            .unwrap();
        protector
            .mark_processed("env-3", "STATION_B", DataType::InventoryTransfer, 2000)
            .unwrap();

        let stats = protector.get_replay_stats().unwrap();
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.oldest_processed_at_ms, Some(1000));
        assert_eq!(stats.newest_processed_at_ms, Some(3000));
        assert_eq!(stats.per_sender.get("STATION_A"), Some(&2));
        assert_eq!(stats.per_sender.get("STATION_B"), Some(&1));
    }
}
