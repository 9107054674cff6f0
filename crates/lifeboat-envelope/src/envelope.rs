use serde::{Deserialize, Serialize};

use lifeboat_core::{DataType, EnvelopeId};

pub const ENVELOPE_VERSION: &str = "2.0";

/// The unsigned metadata carried by every envelope. Kept as its own nested
/// JSON object (rather than flattened) to match the `.xirs` wire format
/// exactly, since other stations deserialize this field by name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    pub version: String,
    pub sender_id: String,
    pub recipient_id: String,
    /// Unix seconds, not milliseconds — matches the `.xirs` wire contract.
    pub timestamp: i64,
    pub data_type: DataType,
}

/// A signed, encrypted message exchanged between stations over whatever
/// transport is available (USB stick, local network, satellite uplink). The
/// on-disk/wire form is this struct serialized to JSON; a file holding one
/// is called a `.xirs` file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecureEnvelope {
    pub envelope_id: EnvelopeId,
    pub header: EnvelopeHeader,
    pub payload_encrypted: String,
    pub nonce: String,
    pub signature: String,
}

impl SecureEnvelope {
    /// The exact byte string that gets signed. Field order and the `|`
    /// separator are part of the wire contract — changing either breaks
    /// interop with any station that hasn't been rebuilt in lockstep.
    pub fn to_be_signed(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.header.sender_id,
            self.header.recipient_id,
            self.envelope_id,
            self.header.timestamp,
            self.payload_encrypted
        )
    }
}

/// The plaintext an envelope decrypts to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecryptedPayload {
    pub schema_version: String,
    pub data_type: DataType,
    pub data: serde_json::Value,
    pub created_at_ms: i64,
}
