use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Identifier for a stored event. A UUIDv7 — time-sortable, so events sorted
/// by `event_id` are sorted by creation time within a node.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.simple().to_string()
    }

    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| CoreError::MalformedId(s.to_string()))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({}…)", &self.0.simple().to_string()[..8])
    }
}

/// Identifier for a secure envelope. A UUIDv4 — no ordering semantics needed.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EnvelopeId(Uuid);

impl EnvelopeId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for EnvelopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for EnvelopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnvelopeId({}…)", &self.0.simple().to_string()[..8])
    }
}

impl FromStr for EnvelopeId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| CoreError::MalformedId(s.to_string()))
    }
}

/// A station identifier. Constrained to `[A-Za-z0-9_-]+` so it can appear
/// unescaped inside the envelope to-be-signed string without a `|` collision.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StationId(String);

impl StationId {
    pub fn new(raw: impl Into<String>) -> Result<Self, CoreError> {
        let raw = raw.into();
        if raw.is_empty()
            || !raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(CoreError::InvalidStationId(raw));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StationId({})", self.0)
    }
}

/// A hybrid logical clock value: `(physical_ms, logical_counter, node_id)`.
///
/// Renders as `"{phys}.{log}.{node}"`. Ordering is lexicographic over the
/// triple, which is also the `Ord` impl here — comparing two `HlcValue`s is
/// the canonical happened-before test.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HlcValue {
    pub physical_ms: i64,
    pub logical: u64,
    pub node_id: String,
}

impl HlcValue {
    pub fn new(physical_ms: i64, logical: u64, node_id: impl Into<String>) -> Self {
        Self {
            physical_ms,
            logical,
            node_id: node_id.into(),
        }
    }

    /// True if `self` happened before `other` under HLC ordering.
    pub fn happened_before(&self, other: &HlcValue) -> bool {
        self.compare(other) == std::cmp::Ordering::Less
    }

    /// True if the two values share a physical time but originate from
    /// different nodes — neither happened-before the other.
    pub fn is_concurrent(&self, other: &HlcValue) -> bool {
        self.physical_ms == other.physical_ms && self.node_id != other.node_id
    }

    pub fn compare(&self, other: &HlcValue) -> std::cmp::Ordering {
        (self.physical_ms, self.logical, &self.node_id).cmp(&(
            other.physical_ms,
            other.logical,
            &other.node_id,
        ))
    }
}

impl PartialOrd for HlcValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for HlcValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.compare(other)
    }
}

impl fmt::Display for HlcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.physical_ms, self.logical, self.node_id)
    }
}

impl fmt::Debug for HlcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for HlcValue {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '.');
        let phys = parts.next().ok_or_else(|| CoreError::MalformedHlc(s.to_string()))?;
        let log = parts.next().ok_or_else(|| CoreError::MalformedHlc(s.to_string()))?;
        let node = parts.next().ok_or_else(|| CoreError::MalformedHlc(s.to_string()))?;
        let physical_ms = phys
            .parse::<i64>()
            .map_err(|_| CoreError::MalformedHlc(s.to_string()))?;
        let logical = log
            .parse::<u64>()
            .map_err(|_| CoreError::MalformedHlc(s.to_string()))?;
        Ok(Self::new(physical_ms, logical, node))
    }
}

/// Entity kind an event or equipment unit belongs to. A closed set of known
/// variants with an escape hatch for forward compatibility — payloads for
/// unknown entity types still round-trip, they simply don't drive a
/// projection this build of the core understands.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Case,
    EquipmentUnit,
    BloodUnit,
    InventoryItem,
    AnesthesiaEvent,
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::Case => write!(f, "case"),
            EntityType::EquipmentUnit => write!(f, "equipment_unit"),
            EntityType::BloodUnit => write!(f, "blood_unit"),
            EntityType::InventoryItem => write!(f, "inventory_item"),
            EntityType::AnesthesiaEvent => write!(f, "anesthesia_event"),
            EntityType::Other(s) => write!(f, "{s}"),
        }
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// Lifecycle status of a clinical case. `PREOP` and `IN_PROGRESS` are open —
/// the OTA active-case guard must never let an update swap or restart the
/// binary out from under a case in either state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    Preop,
    InProgress,
    Postop,
    Completed,
    Cancelled,
}

impl CaseStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, CaseStatus::Preop | CaseStatus::InProgress)
    }
}

/// Physical status of an equipment unit. Statuses in `{MAINTENANCE, OFFLINE,
/// EMPTY}` exclude the unit from resilience aggregation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquipmentStatus {
    Available,
    InUse,
    Charging,
    Empty,
    Maintenance,
    Offline,
}

impl EquipmentStatus {
    /// Statuses that contribute to resilience aggregation without caveat.
    pub fn counts_toward_capacity(&self) -> bool {
        matches!(self, EquipmentStatus::Available | EquipmentStatus::InUse)
    }

    /// Statuses that contribute but should surface a warning (e.g. a
    /// charging unit whose source may not survive isolation).
    pub fn counts_with_warning(&self) -> bool {
        matches!(self, EquipmentStatus::Charging)
    }

    pub fn excluded_from_capacity(&self) -> bool {
        matches!(
            self,
            EquipmentStatus::Maintenance | EquipmentStatus::Offline | EquipmentStatus::Empty
        )
    }
}

/// The closed tagged union of endurance calculation strategies. Unknown
/// strategies for resilience-critical equipment fail closed at config load
/// time rather than falling back to a default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapacityStrategy {
    Linear,
    FuelBased,
    PowerDependent,
    None,
}

/// Resilience alert level for a lifeline (oxygen, power, reagent).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResilienceLevel {
    Safe,
    Warning,
    Critical,
    Unknown,
}

/// Envelope payload routing tag (`.xirs` header `data_type`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    InventoryTransfer,
    PersonTransfer,
    EventLog,
    FullBackup,
    PartialSync,
    Command,
}
