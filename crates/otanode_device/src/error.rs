//! Error types for the device.

use otanode_protocol::{HttpError, ProtocolError};
use thiserror::Error;

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors that can occur on the device.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The request was rejected; answered with this status.
    #[error("{0}")]
    Http(HttpError),

    /// Protocol-level failure other than a rejected request.
    #[error("protocol error: {0}")]
    Protocol(ProtocolError),

    /// Invalid node configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The shared secret file is missing or malformed.
    #[error("cannot load shared secret from {path}: {reason}")]
    Secret {
        /// Path of the secret file.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeviceError {
    /// Returns true if this error is the peer's fault (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, DeviceError::Http(e) if e.is_client_error())
    }

    /// Returns true if this error is the device's fault.
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }
}

impl From<HttpError> for DeviceError {
    fn from(error: HttpError) -> Self {
        DeviceError::Http(error)
    }
}

impl From<ProtocolError> for DeviceError {
    fn from(error: ProtocolError) -> Self {
        match error {
            ProtocolError::Http(e) => DeviceError::Http(e),
            ProtocolError::Io(e) => DeviceError::Io(e),
            other => DeviceError::Protocol(other),
        }
    }
}

impl From<serde_json::Error> for DeviceError {
    fn from(error: serde_json::Error) -> Self {
        DeviceError::Config(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_requests_stay_http() {
        let err: DeviceError = ProtocolError::Http(HttpError::new(431, "header too long")).into();
        assert!(matches!(err, DeviceError::Http(ref e) if e.status == 431));
        assert!(err.is_client_error());
    }

    #[test]
    fn io_is_server_error() {
        let err: DeviceError = ProtocolError::Io(std::io::ErrorKind::BrokenPipe.into()).into();
        assert!(matches!(err, DeviceError::Io(_)));
        assert!(err.is_server_error());
    }

    #[test]
    fn error_display() {
        let err = DeviceError::Secret {
            path: "ota_secret".into(),
            reason: "missing".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot load shared secret from ota_secret: missing"
        );
    }
}
