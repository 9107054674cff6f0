use serde::{Deserialize, Serialize};

use lifeboat_core::Event;

use crate::error::StoreError;
use crate::store::EventStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestoreStatus {
    InProgress,
    Completed,
    Failed,
}

/// One restore-from-backup run. A session groups however many batches a
/// backup transfer is split into, so the CLI can report cumulative progress
/// instead of only a per-batch count. Once a batch arrives with `is_final`
/// set, the session closes and refuses any further batches — a source that
/// needs to resend must start a new session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RestoreSession {
    pub session_id: String,
    pub source_device_id: String,
    pub started_at_ms: i64,
    pub status: RestoreStatus,
    pub next_batch_number: u64,
    pub inserted: u64,
    pub already_present: u64,
    pub rejected: u64,
}

/// One batch's outcome, appended to the session's activity log. Mirrors the
/// per-batch row the restore protocol records: `inserted + already_present +
/// rejected == events_count` always holds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RestoreLogEntry {
    pub session_id: String,
    pub source_device_id: String,
    pub batch_number: u64,
    pub events_count: u64,
    pub inserted: u64,
    pub already_present: u64,
    pub rejected: u64,
    pub is_final: bool,
    pub recorded_at_ms: i64,
}

/// An event a restore batch refused to ingest because its event_id already
/// existed under a different payload hash — a genuine conflict, not a
/// benign replay, so an operator can decide whether to discard the backup
/// or escalate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RestoreReject {
    pub session_id: String,
    pub event_id: String,
    pub expected_hash: String,
    pub incoming_hash: String,
    pub recorded_at_ms: i64,
}

pub struct RestorePipeline<'a> {
    store: &'a EventStore,
    sessions: sled::Tree,
    log: sled::Tree,
    rejects: sled::Tree,
}

impl<'a> RestorePipeline<'a> {
    pub fn open(db: &sled::Db, store: &'a EventStore) -> Result<Self, StoreError> {
        Ok(Self {
            store,
            sessions: db.open_tree("restore_sessions")?,
            log: db.open_tree("restore_log")?,
            rejects: db.open_tree("restore_rejects")?,
        })
    }

    pub fn start_session(&self, source_device_id: &str, now_ms: i64) -> Result<RestoreSession, StoreError> {
        let session = RestoreSession {
            session_id: uuid::Uuid::new_v4().to_string(),
            source_device_id: source_device_id.to_string(),
            started_at_ms: now_ms,
            status: RestoreStatus::InProgress,
            next_batch_number: 1,
            inserted: 0,
            already_present: 0,
            rejected: 0,
        };
        self.put_session(&session)?;
        Ok(session)
    }

    fn put_session(&self, session: &RestoreSession) -> Result<(), StoreError> {
        let bytes = bincode::serialize(session)?;
        self.sessions.insert(session.session_id.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<RestoreSession>, StoreError> {
        match self.sessions.get(session_id.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Apply one batch of restored events to a session: for each event,
    /// recompute its payload hash and look it up by event_id. Absent →
    /// insert. Present with a matching hash → already_present, a benign
    /// replay. Present with a differing hash → rejected, the batch
    /// continues rather than aborting on one bad record. Set `is_final` on
    /// the last batch of a transfer to close the session; any batch sent
    /// after that fails with [`StoreError::SessionClosed`].
    pub fn restore_batch(
        &self,
        session_id: &str,
        events: Vec<Event>,
        is_final: bool,
        now_ms: i64,
    ) -> Result<RestoreLogEntry, StoreError> {
        let mut session = self
            .get_session(session_id)?
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;

        if session.status != RestoreStatus::InProgress {
            return Err(StoreError::SessionClosed(session_id.to_string()));
        }

        let events_count = events.len() as u64;
        let mut batch_inserted = 0u64;
        let mut batch_already_present = 0u64;
        let mut batch_rejected = 0u64;

        for event in events {
            let event_id = event.event_id.to_string();
            let incoming_hash = event.recompute_payload_hash();

            match self.store.get(&event.event_id)? {
                None => {
                    self.store.ingest(&event)?;
                    batch_inserted += 1;
                }
                Some(existing) => {
                    if existing.payload_hash == incoming_hash {
                        batch_already_present += 1;
                    } else {
                        batch_rejected += 1;
                        self.record_reject(session_id, &event_id, &existing.payload_hash, &incoming_hash, now_ms)?;
                    }
                }
            }
        }

        session.inserted += batch_inserted;
        session.already_present += batch_already_present;
        session.rejected += batch_rejected;
        let batch_number = session.next_batch_number;
        session.next_batch_number += 1;
        if is_final {
            session.status = RestoreStatus::Completed;
        }
        self.put_session(&session)?;

        let entry = RestoreLogEntry {
            session_id: session_id.to_string(),
            source_device_id: session.source_device_id.clone(),
            batch_number,
            events_count,
            inserted: batch_inserted,
            already_present: batch_already_present,
            rejected: batch_rejected,
            is_final,
            recorded_at_ms: now_ms,
        };
        self.record_log(&entry)?;
        Ok(entry)
    }

    fn record_log(&self, entry: &RestoreLogEntry) -> Result<(), StoreError> {
        let key = format!("{}:{:010}", entry.session_id, entry.batch_number);
        self.log.insert(key.as_bytes(), bincode::serialize(entry)?)?;
        Ok(())
    }

    fn record_reject(
        &self,
        session_id: &str,
        event_id: &str,
        expected_hash: &str,
        incoming_hash: &str,
        now_ms: i64,
    ) -> Result<(), StoreError> {
        let reject = RestoreReject {
            session_id: session_id.to_string(),
            event_id: event_id.to_string(),
            expected_hash: expected_hash.to_string(),
            incoming_hash: incoming_hash.to_string(),
            recorded_at_ms: now_ms,
        };
        let key = format!("{session_id}:{now_ms}:{event_id}");
        self.rejects
            .insert(key.as_bytes(), bincode::serialize(&reject)?)?;
        Ok(())
    }

    pub fn restore_log(&self, session_id: &str) -> Result<Vec<RestoreLogEntry>, StoreError> {
        let mut out = Vec::new();
        for item in self.log.scan_prefix(format!("{session_id}:").as_bytes()) {
            let (_, bytes) = item?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }

    pub fn restore_rejects(&self, session_id: &str) -> Result<Vec<RestoreReject>, StoreError> {
        let mut out = Vec::new();
        for item in self.rejects.scan_prefix(format!("{session_id}:").as_bytes()) {
            let (_, bytes) = item?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }
}
