use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{EntityType, EventId, HlcValue};

/// Who/what produced an event. Carried alongside the event for audit trails
/// even though only `device_id` participates in conflict resolution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActorContext {
    pub actor_id: String,
    pub actor_name: Option<String>,
    pub actor_role: Option<String>,
    pub device_id: Option<String>,
}

/// The durable, content-addressed unit of the event log. Fields beyond the
/// distilled data model (`site_id`, `actor_name`, `actor_role`, `device_id`,
/// `schema_version`, `synced`, `acknowledged`) mirror the columns a mature
/// deployment accretes once multi-site sync and audit review are in play.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    #[serde(default = "default_site_id")]
    pub site_id: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub actor: ActorContext,
    pub ts_device_ms: i64,
    pub ts_server_ms: Option<i64>,
    pub hlc: HlcValue,
    pub event_type: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub payload: serde_json::Value,
    pub payload_hash: String,
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub acknowledged: bool,
}

fn default_site_id() -> String {
    "main".to_string()
}

fn default_schema_version() -> String {
    "1.0".to_string()
}

/// The caller-supplied half of an event, before the store assigns an id,
/// stamps the HLC, and computes the payload hash.
#[derive(Clone, Debug)]
pub struct EventDraft {
    pub site_id: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub actor: ActorContext,
    pub ts_device_ms: i64,
    pub event_type: String,
    pub payload: serde_json::Value,
}

impl EventDraft {
    pub fn new(
        entity_type: EntityType,
        entity_id: impl Into<String>,
        actor: ActorContext,
        ts_device_ms: i64,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            site_id: default_site_id(),
            entity_type,
            entity_id: entity_id.into(),
            actor,
            ts_device_ms,
            event_type: event_type.into(),
            payload,
        }
    }

    pub fn with_site_id(mut self, site_id: impl Into<String>) -> Self {
        self.site_id = site_id.into();
        self
    }

    /// Finish a draft into a stored `Event`, given an allocated id and an
    /// HLC timestamp already advanced by the caller's clock.
    pub fn into_event(self, event_id: EventId, hlc: HlcValue) -> Event {
        let payload_hash = compute_payload_hash(
            &self.payload,
            &event_id,
            &self.entity_type,
            &self.entity_id,
            &self.event_type,
            self.ts_device_ms,
        );
        Event {
            event_id,
            site_id: self.site_id,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            actor: self.actor,
            ts_device_ms: self.ts_device_ms,
            ts_server_ms: None,
            hlc,
            event_type: self.event_type,
            schema_version: default_schema_version(),
            payload: self.payload,
            payload_hash,
            synced: false,
            acknowledged: false,
        }
    }
}

impl Event {
    /// Recompute the payload hash and compare against the stored one.
    /// Used by the restore pipeline to detect corrupted or tampered records.
    pub fn verify_payload_hash(&self) -> bool {
        self.recompute_payload_hash() == self.payload_hash
    }

    /// Recompute this event's payload hash from its current fields, ignoring
    /// whatever is in `payload_hash` — used to compare an incoming restored
    /// event against a hash computed independently of what it claims.
    pub fn recompute_payload_hash(&self) -> String {
        compute_payload_hash(
            &self.payload,
            &self.event_id,
            &self.entity_type,
            &self.entity_id,
            &self.event_type,
            self.ts_device_ms,
        )
    }
}

/// Canonical payload hash: SHA-256 over
/// `event_id|entity_type|entity_id|event_type|ts_device_ms|<canonical json>`,
/// per spec's `event_id || entity_type || entity_id || event_type ||
/// ts_device || canonical_payload`. Keying the hash on the event's identity
/// and timestamp, not just the payload body, catches a payload being
/// silently reattached to a different event or its device timestamp altered.
fn compute_payload_hash(
    payload: &serde_json::Value,
    event_id: &EventId,
    entity_type: &EntityType,
    entity_id: &str,
    event_type: &str,
    ts_device_ms: i64,
) -> String {
    let canonical = serde_json::to_string(payload).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(event_id.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(entity_type.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(entity_id.as_bytes());
    hasher.update(b"|");
    hasher.update(event_type.as_bytes());
    hasher.update(b"|");
    hasher.update(ts_device_ms.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> ActorContext {
        ActorContext {
            actor_id: "nurse-1".into(),
            actor_name: Some("Jane".into()),
            actor_role: Some("nurse".into()),
            device_id: Some("dev-1".into()),
        }
    }

    #[test]
    fn draft_into_event_computes_matching_hash() {
        let draft = EventDraft::new(
            EntityType::EquipmentUnit,
            "unit-42",
            actor(),
            1000,
            "status_changed",
            serde_json::json!({"status": "AVAILABLE"}),
        );
        let event = draft.into_event(EventId::generate(), HlcValue::new(1000, 0, "N1"));
        assert!(event.verify_payload_hash());
    }

    #[test]
    fn tampered_payload_fails_hash_check() {
        let draft = EventDraft::new(
            EntityType::EquipmentUnit,
            "unit-42",
            actor(),
            1000,
            "status_changed",
            serde_json::json!({"status": "AVAILABLE"}),
        );
        let mut event = draft.into_event(EventId::generate(), HlcValue::new(1000, 0, "N1"));
        event.payload = serde_json::json!({"status": "OFFLINE"});
        assert!(!event.verify_payload_hash());
    }

    #[test]
    fn site_id_defaults_to_main() {
        let json = serde_json::json!({
            "event_id": uuid::Uuid::now_v7().to_string(),
            "entity_type": "equipment_unit",
            "entity_id": "unit-1",
            "actor": {"actor_id": "a1", "actor_name": null, "actor_role": null, "device_id": null},
            "ts_device_ms": 0,
            "ts_server_ms": null,
            "hlc": {"physical_ms": 0, "logical": 0, "node_id": "N1"},
            "event_type": "created",
            "payload": {},
            "payload_hash": "x",
        });
        let event: Event = serde_json::from_value(json).unwrap();
        assert_eq!(event.site_id, "main");
        assert_eq!(event.schema_version, "1.0");
    }
}
