//! Error types for the btcnode header synchronizer.

use std::io;

use thiserror::Error;

/// Main error type returned by the public API.
#[derive(Debug, Error)]
pub enum BtcNodeError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// A block request was not answered within the configured timeout.
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// An inventory wait was cancelled by the caller.
    #[error("Interrupted")]
    Interrupted,

    /// `read_block` was called while the cursor is not on a header.
    #[error("Cursor is not positioned on a header")]
    NoCurrentHeader,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),
}

impl BtcNodeError {
    /// Whether this error is a timeout at any layer.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            BtcNodeError::Timeout(_)
                | BtcNodeError::Sync(SyncError::Timeout(_))
                | BtcNodeError::Network(NetworkError::Timeout | NetworkError::HandshakeTimeout)
        )
    }
}

/// Parse-related errors.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid network name: {0}")]
    InvalidNetwork(String),

    #[error("Invalid anchor '{0}': {1}")]
    InvalidAnchor(String, String),
}

/// Logging-related errors.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to create log directory: {0}")]
    DirectoryCreation(#[from] io::Error),

    #[error("Subscriber initialization failed: {0}")]
    SubscriberInit(String),

    #[error("Log rotation failed: {0}")]
    RotationFailed(String),
}

/// Network-related errors.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Handshake timed out")]
    HandshakeTimeout,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Peer disconnected")]
    PeerDisconnected,

    #[error("Not connected")]
    NotConnected,

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Message serialization error: {0}")]
    Serialization(#[from] bitcoin::consensus::encode::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Address parse error: {0}")]
    AddressParse(String),
}

/// Header synchronization errors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The peer did not answer a header request in time.
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Orphan elimination found no unique parent at `height`.
    #[error("No valid parent found at height {height} while eliminating orphans")]
    AmbiguousChain {
        height: u32,
    },

    #[error("Network error: {0}")]
    Network(#[source] NetworkError),
}

impl SyncError {
    /// Returns a static string representing the error category based on the variant
    pub fn category(&self) -> &'static str {
        match self {
            SyncError::Timeout(_) => "timeout",
            SyncError::AmbiguousChain {
                ..
            } => "chain",
            SyncError::Network(_) => "network",
        }
    }
}

impl From<NetworkError> for SyncError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::Timeout => SyncError::Timeout("waiting for headers".to_string()),
            other => SyncError::Network(other),
        }
    }
}

/// Type alias for Result with BtcNodeError.
pub type Result<T> = std::result::Result<T, BtcNodeError>;

/// Type alias for network operation results.
pub type NetworkResult<T> = std::result::Result<T, NetworkError>;

/// Type alias for sync operation results.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Type alias for logging operation results.
pub type LoggingResult<T> = std::result::Result<T, LoggingError>;
