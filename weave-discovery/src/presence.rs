//! The presence directory.
//!
//! A single lock-guarded map of known devices. The lock is held only for
//! the duration of the map operation, never across I/O, so readers on the
//! query path cannot be blocked by the network loops. All time-dependent
//! queries take `now` as a parameter — the directory itself never looks at
//! the clock.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use weave_types::{DeviceId, DeviceRecord, DeviceStatus};

/// In-memory table of known peer devices and their last-seen state.
#[derive(Debug, Default)]
pub struct PresenceDirectory {
    devices: Mutex<HashMap<DeviceId, DeviceRecord>>,
}

impl PresenceDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or refreshes a device record. The newest `last_seen` wins,
    /// so replaying an old announcement never rolls a device back.
    pub fn upsert(&self, record: DeviceRecord) {
        let mut devices = self.devices.lock().unwrap();
        match devices.get_mut(&record.id) {
            Some(existing) => {
                if record.last_seen >= existing.last_seen {
                    *existing = record;
                }
            }
            None => {
                devices.insert(record.id, record);
            }
        }
    }

    /// Looks up one device, with status derived at `now`.
    pub fn get(&self, id: &DeviceId, now: DateTime<Utc>, timeout: Duration) -> Option<DeviceRecord> {
        let devices = self.devices.lock().unwrap();
        devices.get(id).map(|r| with_status(r.clone(), now, timeout))
    }

    /// Snapshot of every known device, status derived at `now`, sorted by
    /// name for stable output.
    pub fn all(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<DeviceRecord> {
        let devices = self.devices.lock().unwrap();
        let mut records: Vec<DeviceRecord> = devices
            .values()
            .map(|r| with_status(r.clone(), now, timeout))
            .collect();
        drop(devices);
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    /// Snapshot of the devices currently online at `now`.
    pub fn online(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<DeviceRecord> {
        self.all(now, timeout)
            .into_iter()
            .filter(|r| r.status == DeviceStatus::Online)
            .collect()
    }

    /// Forgets devices not heard from within the grace window. Returns how
    /// many were removed.
    pub fn sweep(&self, now: DateTime<Utc>, grace: Duration) -> usize {
        let mut devices = self.devices.lock().unwrap();
        let before = devices.len();
        devices.retain(|_, r| now.signed_duration_since(r.last_seen) < grace);
        before - devices.len()
    }

    /// Removes one device outright.
    pub fn remove(&self, id: &DeviceId) -> Option<DeviceRecord> {
        self.devices.lock().unwrap().remove(id)
    }

    /// Number of known devices, online or not.
    pub fn len(&self) -> usize {
        self.devices.lock().unwrap().len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.devices.lock().unwrap().is_empty()
    }
}

fn with_status(mut record: DeviceRecord, now: DateTime<Utc>, timeout: Duration) -> DeviceRecord {
    record.status = record.status_at(now, timeout);
    record
}
