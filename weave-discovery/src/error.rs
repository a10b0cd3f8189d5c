//! Error types for the discovery layer.

use thiserror::Error;

/// Result type for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Errors that can occur in discovery operations.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The listener could not bind its port. Fatal for the listener loop
    /// only; the broadcaster keeps announcing.
    #[error("failed to bind discovery port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Socket send/receive failure.
    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),

    /// Malformed announcement payload.
    #[error("malformed announcement: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Datagram larger than the protocol cap.
    #[error("oversized datagram: {len} bytes")]
    Oversized { len: usize },

    /// `host:port` string that could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}
