//! Discovery service configuration.

use chrono::Duration as ChronoDuration;
use std::time::Duration;

/// Configuration for the discovery service.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// UDP port announcements are broadcast on and received from.
    pub discovery_port: u16,
    /// Address announcements are broadcast to.
    pub broadcast_addr: String,
    /// Seconds between announcements.
    pub broadcast_interval_secs: u64,
    /// Seconds without an announcement before a device reads as offline.
    pub device_timeout_secs: u64,
    /// Seconds without an announcement before a device is forgotten
    /// entirely. Offline devices are retained and reported until then.
    pub removal_grace_secs: u64,
    /// Bounded wait for the loops to exit on `stop()`.
    pub shutdown_timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            discovery_port: 8001,
            broadcast_addr: "255.255.255.255".to_string(),
            broadcast_interval_secs: 5,
            device_timeout_secs: 30,
            removal_grace_secs: 300,
            shutdown_timeout_secs: 3,
        }
    }
}

impl DiscoveryConfig {
    /// Broadcast interval as a std `Duration`.
    #[must_use]
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_secs(self.broadcast_interval_secs)
    }

    /// Offline threshold as a chrono `Duration` for `last_seen` arithmetic.
    #[must_use]
    pub fn device_timeout(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.device_timeout_secs as i64)
    }

    /// Removal grace window as a chrono `Duration`.
    #[must_use]
    pub fn removal_grace(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.removal_grace_secs as i64)
    }

    /// `host:port` broadcast target.
    #[must_use]
    pub fn broadcast_target(&self) -> String {
        format!("{}:{}", self.broadcast_addr, self.discovery_port)
    }
}
