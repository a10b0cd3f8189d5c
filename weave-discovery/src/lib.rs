//! UDP broadcast device discovery for Weave.
//!
//! Devices on the same subnet find each other without a central registry:
//! every device periodically broadcasts a `device_announcement` datagram and
//! listens for everyone else's. Announcements land in the presence
//! directory, where reachability is derived from `last_seen` against a
//! timeout — no acknowledgements, no ordering requirements, duplicate and
//! out-of-order delivery are harmless.
//!
//! # Components
//!
//! - **`PresenceDirectory`**: the lock-guarded table of known devices
//! - **announce**: the datagram wire format (encode/decode, size cap)
//! - **`DiscoveryService`**: the broadcaster and listener loops
//!
//! The listener trusts the datagram's source IP over whatever address the
//! payload claims; a device's own view of its IP is routinely wrong behind
//! NAT or multi-homed hosts.

pub mod announce;
mod config;
mod error;
mod presence;
mod service;

pub use announce::{DiscoveryMessage, MAX_DATAGRAM_SIZE};
pub use config::DiscoveryConfig;
pub use error::{DiscoveryError, DiscoveryResult};
pub use presence::PresenceDirectory;
pub use service::DiscoveryService;
