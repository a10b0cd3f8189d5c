//! Device identity and reachability.
//!
//! `DeviceRecord` is the unit exchanged in discovery announcements and kept
//! in the presence directory. Its `status` is never authoritative: any view
//! of a record derives online/offline from `now - last_seen` against a
//! timeout, except the local device's own record which is always online.

use crate::{DeviceId, Error};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;

/// What class of device a peer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Server,
    Desktop,
    Mobile,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::Desktop => write!(f, "desktop"),
            Self::Mobile => write!(f, "mobile"),
        }
    }
}

impl FromStr for DeviceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "server" => Ok(Self::Server),
            "desktop" => Ok(Self::Desktop),
            "mobile" => Ok(Self::Mobile),
            other => Err(Error::InvalidDeviceKind(other.to_string())),
        }
    }
}

/// Derived reachability of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
}

/// Identity and reachability of one device.
///
/// Serializes to the announcement wire format: `kind` maps to the `type`
/// field, timestamps are ISO-8601.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Stable UUID, generated once per process lifetime.
    pub id: DeviceId,
    /// Human-readable device name.
    pub name: String,
    /// Device class.
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    /// OS/architecture string, e.g. `linux-x86_64`.
    pub platform: String,
    /// IP the device's API is reachable at. For records learned from an
    /// announcement this is the datagram's source IP, not the payload value.
    pub ip_address: String,
    /// Port the device's API listens on.
    pub port: u16,
    /// Application version the device advertises.
    pub version: String,
    /// Capability strings, e.g. `sync`, `search`.
    pub capabilities: Vec<String>,
    /// When the device was last heard from.
    pub last_seen: DateTime<Utc>,
    /// Reachability as of the last snapshot. Derived, never authoritative.
    pub status: DeviceStatus,
}

impl DeviceRecord {
    /// Builds the record for the local device, collecting platform details
    /// from the environment. The local record is always online.
    #[must_use]
    pub fn local(name: impl Into<String>, kind: DeviceKind, ip_address: impl Into<String>, port: u16) -> Self {
        Self {
            id: DeviceId::new(),
            name: name.into(),
            kind,
            platform: format!("{}-{}", env::consts::OS, env::consts::ARCH),
            ip_address: ip_address.into(),
            port,
            version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities: Vec::new(),
            last_seen: Utc::now(),
            status: DeviceStatus::Online,
        }
    }

    /// Adds capability strings to the record.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// `host:port` the device's API is reachable at.
    #[must_use]
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.ip_address, self.port)
    }

    /// Reachability at `now`: online iff the record was seen strictly less
    /// than `timeout` ago.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>, timeout: Duration) -> DeviceStatus {
        if now.signed_duration_since(self.last_seen) < timeout {
            DeviceStatus::Online
        } else {
            DeviceStatus::Offline
        }
    }

    /// Refreshes `last_seen`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_seen = now;
    }
}

/// Best-effort hostname for naming the local device.
#[must_use]
pub fn hostname() -> String {
    env::var("HOSTNAME")
        .or_else(|_| env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "weave-device".to_string())
}
