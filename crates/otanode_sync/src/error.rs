//! Error types for the sync engine.

use otanode_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync run.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The device answered with a status other than 200.
    #[error("{operation} {target}: {status} {body}")]
    Rejected {
        /// What was attempted (`listing`, `push`, `delete`, `reboot`).
        operation: &'static str,
        /// File or endpoint involved.
        target: String,
        /// Response status.
        status: u16,
        /// Response body, lossily decoded.
        body: String,
    },

    /// Protocol error (malformed listing, bad secret, ...).
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A file name does not satisfy the OTA filename policy.
    #[error("invalid filename in deploy listing: '{0}'")]
    InvalidFilename(String),

    /// The device registry is missing an entry or is malformed.
    #[error("registry error: {0}")]
    Registry(String),

    /// A sensor could not be rendered into the device configuration.
    #[error("invalid sensor {sensor}: {reason}")]
    Sensor {
        /// Sensor name.
        sensor: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The object store failed.
    #[error("object store error: {0}")]
    ObjectStore(String),

    /// JSON error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if running again may succeed without changes.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
