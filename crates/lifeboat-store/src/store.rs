use std::path::Path;

use lifeboat_core::constants::MIN_EVENT_PAYLOAD_LIMIT_BYTES;
use lifeboat_core::{Event, EventDraft, EventId, HlcValue};
use lifeboat_hlc::HybridLogicalClock;

use crate::error::StoreError;

/// Append-only event log backed by sled.
///
/// Trees:
///   events          — event_id bytes                       → bincode(Event)
///   events_by_hlc   — physical_ms(BE) . logical(BE) . id    → event_id bytes
///   events_by_entity — entity_type|entity_id|hlc_key        → event_id bytes
///
/// The ordering tree exists because sled iterates keys in byte order — a
/// naive scan of `events` would come back in insertion order, not HLC order,
/// and the restore pipeline and sync cursor both need HLC order.
pub struct EventStore {
    events: sled::Tree,
    by_hlc: sled::Tree,
    by_entity: sled::Tree,
}

fn hlc_key(hlc: &HlcValue, event_id: &EventId) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + 8 + 16);
    key.extend_from_slice(&hlc.physical_ms.to_be_bytes());
    key.extend_from_slice(&hlc.logical.to_be_bytes());
    key.extend_from_slice(event_id.as_uuid().as_bytes());
    key
}

impl EventStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self {
            events: db.open_tree("events")?,
            by_hlc: db.open_tree("events_by_hlc")?,
            by_entity: db.open_tree("events_by_entity")?,
        })
    }

    pub fn open_in(db: &sled::Db) -> Result<Self, StoreError> {
        Ok(Self {
            events: db.open_tree("events")?,
            by_hlc: db.open_tree("events_by_hlc")?,
            by_entity: db.open_tree("events_by_entity")?,
        })
    }

    /// Append an event: allocate an id, advance the clock merging in
    /// `remote_hlc` when the draft originated on another node, and persist.
    /// `event_id` is freshly generated so a collision should not happen, but
    /// it is checked anyway — a caller retrying after a crash must not
    /// silently double-insert.
    pub fn append(
        &self,
        draft: EventDraft,
        clock: &HybridLogicalClock,
        remote_hlc: Option<&HlcValue>,
    ) -> Result<Event, StoreError> {
        let payload_bytes = serde_json::to_vec(&draft.payload).map_err(|e| StoreError::Serialization(e.to_string()))?;
        if payload_bytes.len() > MIN_EVENT_PAYLOAD_LIMIT_BYTES {
            return Err(StoreError::PayloadTooLarge {
                max: MIN_EVENT_PAYLOAD_LIMIT_BYTES,
                got: payload_bytes.len(),
            });
        }

        let hlc = clock.update(remote_hlc);
        let event_id = EventId::generate();
        if self.events.contains_key(event_id.as_uuid().as_bytes())? {
            return Err(StoreError::DuplicateEventId(event_id.to_string()));
        }
        let event = draft.into_event(event_id, hlc);
        self.put(&event)?;
        Ok(event)
    }

    fn put(&self, event: &Event) -> Result<(), StoreError> {
        let bytes = bincode::serialize(event)?;
        self.events
            .insert(event.event_id.as_uuid().as_bytes(), bytes)?;

        let hk = hlc_key(&event.hlc, &event.event_id);
        self.by_hlc
            .insert(hk.clone(), event.event_id.as_uuid().as_bytes())?;

        let mut entity_key = Vec::new();
        entity_key.extend_from_slice(event.entity_type.to_string().as_bytes());
        entity_key.push(0);
        entity_key.extend_from_slice(event.entity_id.as_bytes());
        entity_key.push(0);
        entity_key.extend_from_slice(&hk);
        self.by_entity
            .insert(entity_key, event.event_id.as_uuid().as_bytes())?;

        Ok(())
    }

    /// Insert an event received from a peer or restore source. Returns
    /// `false` without error if the event id is already present — sync and
    /// restore are both expected to replay overlapping ranges.
    pub fn ingest(&self, event: &Event) -> Result<bool, StoreError> {
        if self.events.contains_key(event.event_id.as_uuid().as_bytes())? {
            return Ok(false);
        }
        self.put(event)?;
        Ok(true)
    }

    pub fn get(&self, event_id: &EventId) -> Result<Option<Event>, StoreError> {
        match self.events.get(event_id.as_uuid().as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Events strictly after `since` in HLC order (or all events if `since`
    /// is `None`), oldest first, capped at `limit`.
    pub fn list_since(&self, since: Option<&HlcValue>, limit: usize) -> Result<Vec<Event>, StoreError> {
        let mut out = Vec::new();
        for item in self.by_hlc.iter() {
            let (key, id_bytes) = item?;
            if let Some(since) = since {
                let key_hlc_prefix = &key[..16];
                let since_prefix = {
                    let mut b = Vec::with_capacity(16);
                    b.extend_from_slice(&since.physical_ms.to_be_bytes());
                    b.extend_from_slice(&since.logical.to_be_bytes());
                    b
                };
                if key_hlc_prefix <= since_prefix.as_slice() {
                    continue;
                }
            }
            let id = uuid::Uuid::from_slice(&id_bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
            if let Some(event) = self.get(&EventId::from_uuid(id))? {
                out.push(event);
            }
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }

    pub fn list_by_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<Event>, StoreError> {
        let mut prefix = Vec::new();
        prefix.extend_from_slice(entity_type.as_bytes());
        prefix.push(0);
        prefix.extend_from_slice(entity_id.as_bytes());
        prefix.push(0);

        let mut out = Vec::new();
        for item in self.by_entity.scan_prefix(&prefix) {
            let (_, id_bytes) = item?;
            let id = uuid::Uuid::from_slice(&id_bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
            if let Some(event) = self.get(&EventId::from_uuid(id))? {
                out.push(event);
            }
        }
        Ok(out)
    }

    /// All events for every entity of `entity_type`, e.g. every case event
    /// regardless of which case it belongs to — used to project current
    /// per-entity state (such as a case's open/closed status) without
    /// knowing its entity_id up front.
    pub fn list_by_entity_type(&self, entity_type: &str) -> Result<Vec<Event>, StoreError> {
        let mut prefix = Vec::new();
        prefix.extend_from_slice(entity_type.as_bytes());
        prefix.push(0);

        let mut out = Vec::new();
        for item in self.by_entity.scan_prefix(&prefix) {
            let (_, id_bytes) = item?;
            let id = uuid::Uuid::from_slice(&id_bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
            if let Some(event) = self.get(&EventId::from_uuid(id))? {
                out.push(event);
            }
        }
        Ok(out)
    }

    /// Round-trips a throwaway key through the `events` tree so a health
    /// probe can tell "reachable" (`len()`/`get()` succeed against a stale
    /// handle) apart from "actually writable" (disk full, tree read-only).
    pub fn health_check_writable(&self) -> Result<(), StoreError> {
        let key = b"__health_check__";
        self.events.insert(key, b"ok".to_vec())?;
        self.events.remove(key)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifeboat_core::{ActorContext, EntityType};

    fn actor() -> ActorContext {
        ActorContext {
            actor_id: "nurse-1".into(),
            actor_name: None,
            actor_role: None,
            device_id: None,
        }
    }

    fn draft(entity_id: &str) -> EventDraft {
        EventDraft::new(
            EntityType::EquipmentUnit,
            entity_id,
            actor(),
            1000,
            "status_changed",
            serde_json::json!({"status": "AVAILABLE"}),
        )
    }

    #[test]
    fn append_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();
        let clock = HybridLogicalClock::new("N1");

        let event = store.append(draft("unit-1"), &clock, None).unwrap();
        let fetched = store.get(&event.event_id).unwrap().unwrap();
        assert_eq!(fetched.event_id, event.event_id);
    }

    #[test]
    fn list_since_returns_strictly_later_events_in_hlc_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();
        let clock = HybridLogicalClock::new("N1");

        let first = store.append(draft("unit-1"), &clock, None).unwrap();
        let _second = store.append(draft("unit-2"), &clock, None).unwrap();
        let third = store.append(draft("unit-3"), &clock, None).unwrap();

        let since_first = store.list_since(Some(&first.hlc), 10).unwrap();
        assert_eq!(since_first.len(), 2);
        assert_eq!(since_first.last().unwrap().event_id, third.event_id);
    }

    #[test]
    fn ingest_is_idempotent_on_duplicate_event_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();
        let clock = HybridLogicalClock::new("N1");

        let event = store.append(draft("unit-1"), &clock, None).unwrap();
        assert!(!store.ingest(&event).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn list_by_entity_filters_to_matching_entity() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();
        let clock = HybridLogicalClock::new("N1");

        store.append(draft("unit-1"), &clock, None).unwrap();
        store.append(draft("unit-2"), &clock, None).unwrap();

        let events = store.list_by_entity("equipment_unit", "unit-1").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].entity_id, "unit-1");
    }

    #[test]
    fn list_by_entity_type_spans_every_entity_of_that_type() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();
        let clock = HybridLogicalClock::new("N1");

        store.append(draft("unit-1"), &clock, None).unwrap();
        store.append(draft("unit-2"), &clock, None).unwrap();
        store
            .append(
                EventDraft::new(EntityType::Case, "case-1", actor(), 1000, "opened", serde_json::json!({})),
                &clock,
                None,
            )
            .unwrap();

        let equipment_events = store.list_by_entity_type("equipment_unit").unwrap();
        assert_eq!(equipment_events.len(), 2);
        let case_events = store.list_by_entity_type("case").unwrap();
        assert_eq!(case_events.len(), 1);
    }

    #[test]
    fn append_merges_a_remote_hlc_rather_than_only_advancing_locally() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();
        let clock = HybridLogicalClock::new("N1");

        let remote = lifeboat_core::HlcValue::new(5_000_000_000, 3, "N2");
        let event = store.append(draft("unit-1"), &clock, Some(&remote)).unwrap();
        assert!(remote.happened_before(&event.hlc));
    }

    #[test]
    fn health_check_writable_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();
        store.health_check_writable().unwrap();
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn oversized_payload_is_rejected_before_insert() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();
        let clock = HybridLogicalClock::new("N1");

        let huge = serde_json::json!({"blob": "x".repeat(MIN_EVENT_PAYLOAD_LIMIT_BYTES + 1)});
        let oversized_draft = EventDraft::new(EntityType::EquipmentUnit, "unit-1", actor(), 1000, "status_changed", huge);

        let err = store.append(oversized_draft, &clock, None).unwrap_err();
        assert!(matches!(err, StoreError::PayloadTooLarge { .. }));
        assert_eq!(store.len(), 0);
    }
}
