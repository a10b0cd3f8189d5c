//! Announcement wire format.
//!
//! One message type today: `device_announcement`, a JSON datagram carrying
//! the sender's `DeviceRecord`. Unknown `type` values are ignored so older
//! devices keep working when the protocol grows; malformed payloads and
//! datagrams over the size cap are dropped.

use crate::error::{DiscoveryError, DiscoveryResult};
use serde::{Deserialize, Serialize};
use weave_types::DeviceRecord;

/// Datagrams larger than this are dropped without parsing.
pub const MAX_DATAGRAM_SIZE: usize = 4096;

const DEVICE_ANNOUNCEMENT: &str = "device_announcement";

/// A discovery datagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscoveryMessage {
    /// A device advertising its identity and reachability.
    DeviceAnnouncement { device: DeviceRecord },
}

impl DiscoveryMessage {
    /// Wraps a device record in an announcement.
    #[must_use]
    pub fn announcement(device: DeviceRecord) -> Self {
        Self::DeviceAnnouncement { device }
    }
}

/// Encodes a message for broadcast.
pub fn encode(message: &DiscoveryMessage) -> DiscoveryResult<Vec<u8>> {
    Ok(serde_json::to_vec(message)?)
}

/// Decodes a received datagram.
///
/// Returns `Ok(None)` for well-formed messages of an unknown `type`
/// (ignored by protocol rule); errors for oversized or malformed payloads.
pub fn decode(payload: &[u8]) -> DiscoveryResult<Option<DiscoveryMessage>> {
    if payload.len() > MAX_DATAGRAM_SIZE {
        return Err(DiscoveryError::Oversized { len: payload.len() });
    }

    let value: serde_json::Value = serde_json::from_slice(payload)?;
    match value.get("type").and_then(|t| t.as_str()) {
        Some(DEVICE_ANNOUNCEMENT) => Ok(Some(serde_json::from_value(value)?)),
        Some(_) => Ok(None),
        None => Err(DiscoveryError::Malformed(serde::de::Error::custom(
            "missing type field",
        ))),
    }
}
