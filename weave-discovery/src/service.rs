//! The discovery service: broadcaster and listener loops.
//!
//! Two supervised tasks per instance. The broadcaster announces the local
//! device on the subnet broadcast address; the listener ingests everyone
//! else's announcements into the presence directory and sweeps out devices
//! past the removal grace window. Transient socket errors recreate the
//! socket; only a failed bind is fatal, and then only for the listener —
//! a device that cannot receive still announces itself.

use crate::announce::{self, DiscoveryMessage, MAX_DATAGRAM_SIZE};
use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::presence::PresenceDirectory;
use chrono::Utc;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use weave_types::{DeviceId, DeviceKind, DeviceRecord, DeviceStatus};

/// How long the listener blocks on a receive before checking for shutdown
/// and running directory cleanup.
const RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// Announces the local device and tracks peers in a presence directory.
pub struct DiscoveryService {
    local: Arc<Mutex<DeviceRecord>>,
    directory: Arc<PresenceDirectory>,
    config: DiscoveryConfig,
    running: AtomicBool,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DiscoveryService {
    /// Creates a stopped service for the given local device.
    #[must_use]
    pub fn new(local_device: DeviceRecord, config: DiscoveryConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            local: Arc::new(Mutex::new(local_device)),
            directory: Arc::new(PresenceDirectory::new()),
            config,
            running: AtomicBool::new(false),
            shutdown,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// The local device's id.
    #[must_use]
    pub fn local_device_id(&self) -> DeviceId {
        self.local.lock().unwrap().id
    }

    /// Starts the broadcaster and listener loops. Idempotent: a second call
    /// while running is a no-op.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("discovery already running");
            return;
        }
        let _ = self.shutdown.send(false);

        info!(
            port = self.config.discovery_port,
            interval = self.config.broadcast_interval_secs,
            "starting discovery"
        );

        let mut tasks = self.tasks.lock().unwrap();
        tasks.push(tokio::spawn(broadcast_loop(
            self.config.clone(),
            self.local.clone(),
            self.shutdown.subscribe(),
        )));
        tasks.push(tokio::spawn(listen_loop(
            self.config.clone(),
            self.local.lock().unwrap().id,
            self.directory.clone(),
            self.shutdown.subscribe(),
        )));
    }

    /// Signals both loops to exit and waits for them, bounded. On timeout
    /// it logs and returns anyway — shutdown never hangs the process.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown.send(true);

        let handles: Vec<JoinHandle<()>> = self.tasks.lock().unwrap().drain(..).collect();
        let deadline = Duration::from_secs(self.config.shutdown_timeout_secs);
        for handle in handles {
            if tokio::time::timeout(deadline, handle).await.is_err() {
                warn!("discovery loop did not stop within {deadline:?}, abandoning it");
            }
        }
        info!("discovery stopped");
    }

    /// Devices currently online. Never touches the network.
    #[must_use]
    pub fn online_devices(&self) -> Vec<DeviceRecord> {
        self.directory.online(Utc::now(), self.config.device_timeout())
    }

    /// Every known device, online or offline. Never touches the network.
    #[must_use]
    pub fn all_devices(&self) -> Vec<DeviceRecord> {
        self.directory.all(Utc::now(), self.config.device_timeout())
    }

    /// Looks up a device by id. For the local device's own id this returns
    /// the local record, always online with a fresh `last_seen`.
    #[must_use]
    pub fn device_by_id(&self, id: &DeviceId) -> Option<DeviceRecord> {
        let local = self.local.lock().unwrap();
        if local.id == *id {
            let mut record = local.clone();
            record.last_seen = Utc::now();
            record.status = DeviceStatus::Online;
            return Some(record);
        }
        drop(local);
        self.directory
            .get(id, Utc::now(), self.config.device_timeout())
    }

    /// Manually registers or refreshes a device learned through a side
    /// channel (an inbound connection, say) rather than a broadcast.
    pub fn register_device(
        &self,
        id: DeviceId,
        name: &str,
        kind: DeviceKind,
        address: &str,
    ) -> DiscoveryResult<()> {
        let (ip_address, port) = split_host_port(address)?;
        self.directory.upsert(DeviceRecord {
            id,
            name: name.to_string(),
            kind,
            platform: String::new(),
            ip_address,
            port,
            version: String::new(),
            capabilities: Vec::new(),
            last_seen: Utc::now(),
            status: DeviceStatus::Online,
        });
        debug!("registered device {id} ({name}) at {address}");
        Ok(())
    }

    /// Feeds one received datagram into the directory, applying the same
    /// rules as the listener loop: size cap, unknown types ignored,
    /// self-announcements discarded, source IP authoritative.
    pub fn handle_datagram(&self, payload: &[u8], source: IpAddr) {
        ingest_datagram(
            &self.directory,
            self.local.lock().unwrap().id,
            payload,
            source,
        );
    }

    /// The presence directory, for callers that want raw access in tests.
    #[must_use]
    pub fn directory(&self) -> &Arc<PresenceDirectory> {
        &self.directory
    }
}

fn split_host_port(address: &str) -> DiscoveryResult<(String, u16)> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| DiscoveryError::InvalidAddress(address.to_string()))?;
    let port: u16 = port
        .parse()
        .map_err(|_| DiscoveryError::InvalidAddress(address.to_string()))?;
    Ok((host.to_string(), port))
}

/// Applies the listener's ingestion rules to one datagram.
fn ingest_datagram(
    directory: &PresenceDirectory,
    local_id: DeviceId,
    payload: &[u8],
    source: IpAddr,
) {
    let message = match announce::decode(payload) {
        Ok(Some(m)) => m,
        Ok(None) => {
            debug!("ignoring datagram of unknown type from {source}");
            return;
        }
        Err(e) => {
            debug!("dropping datagram from {source}: {e}");
            return;
        }
    };

    let DiscoveryMessage::DeviceAnnouncement { mut device } = message;
    if device.id == local_id {
        return;
    }

    // The sender's own view of its IP is untrusted; the packet's source
    // address is authoritative. The payload port stays: it names the API
    // port, not the ephemeral UDP source port.
    device.ip_address = source.to_string();
    directory.upsert(device);
}

async fn broadcast_loop(
    config: DiscoveryConfig,
    local: Arc<Mutex<DeviceRecord>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let target = config.broadcast_target();
    let mut socket: Option<UdpSocket> = None;

    loop {
        if *shutdown.borrow() {
            break;
        }

        if socket.is_none() {
            match make_broadcast_socket().await {
                Ok(s) => socket = Some(s),
                Err(e) => {
                    warn!("failed to open broadcast socket: {e}");
                }
            }
        }

        if let Some(s) = socket.as_ref() {
            let payload = {
                let mut record = local.lock().unwrap();
                record.touch(Utc::now());
                record.status = DeviceStatus::Online;
                announce::encode(&DiscoveryMessage::announcement(record.clone()))
            };
            match payload {
                Ok(bytes) => {
                    if let Err(e) = s.send_to(&bytes, target.as_str()).await {
                        warn!("broadcast send failed, recreating socket: {e}");
                        socket = None;
                    }
                }
                Err(e) => warn!("failed to encode announcement: {e}"),
            }
        }

        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            () = tokio::time::sleep(config.broadcast_interval()) => {}
        }
    }
    debug!("broadcast loop exiting");
}

async fn make_broadcast_socket() -> DiscoveryResult<UdpSocket> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
    socket.set_broadcast(true)?;
    Ok(socket)
}

async fn listen_loop(
    config: DiscoveryConfig,
    local_id: DeviceId,
    directory: Arc<PresenceDirectory>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut socket = match UdpSocket::bind(("0.0.0.0", config.discovery_port)).await {
        Ok(s) => s,
        Err(e) => {
            // Fatal for this loop only: the device keeps announcing itself
            // even when it cannot receive.
            error!(
                "failed to bind discovery port {}: {e}; listener disabled",
                config.discovery_port
            );
            return;
        }
    };
    debug!("listening for announcements on port {}", config.discovery_port);

    // One byte over the cap so oversized datagrams are detectable rather
    // than silently truncated to a valid length.
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE + 1];

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            result = tokio::time::timeout(RECV_TIMEOUT, socket.recv_from(&mut buf)) => {
                match result {
                    Ok(Ok((len, src))) => {
                        if len > MAX_DATAGRAM_SIZE {
                            debug!("dropping oversized datagram ({len} bytes) from {src}");
                        } else {
                            ingest_datagram(&directory, local_id, &buf[..len], src.ip());
                        }
                    }
                    Ok(Err(e)) => {
                        warn!("discovery receive failed, recreating socket: {e}");
                        match UdpSocket::bind(("0.0.0.0", config.discovery_port)).await {
                            Ok(s) => socket = s,
                            Err(e) => {
                                error!("failed to rebind discovery port: {e}; listener disabled");
                                return;
                            }
                        }
                    }
                    Err(_) => {} // receive timeout: fall through to cleanup
                }
            }
        }

        let removed = directory.sweep(Utc::now(), config.removal_grace());
        if removed > 0 {
            debug!("swept {removed} expired devices from directory");
        }
    }
    debug!("listen loop exiting");
}
