//! Error types for the OTA protocol.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// A request-level failure carrying the status code sent back to the peer.
///
/// Raised where the problem is detected and converted into a wire response
/// at the connection boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    /// HTTP status code.
    pub status: u16,
    /// Short human readable explanation, sent as the response body.
    pub explanation: String,
}

impl HttpError {
    /// Creates a new error with the given status and explanation.
    pub fn new(status: u16, explanation: impl Into<String>) -> Self {
        Self {
            status,
            explanation: explanation.into(),
        }
    }

    /// 400 Bad Request.
    pub fn bad_request(explanation: impl Into<String>) -> Self {
        Self::new(400, explanation)
    }

    /// 403 Forbidden.
    pub fn forbidden(explanation: impl Into<String>) -> Self {
        Self::new(403, explanation)
    }

    /// 404 Not Found.
    pub fn not_found(explanation: impl Into<String>) -> Self {
        Self::new(404, explanation)
    }

    /// 405 Method Not Allowed.
    pub fn method_not_allowed(explanation: impl Into<String>) -> Self {
        Self::new(405, explanation)
    }

    /// Returns true for 4xx statuses.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Returns true for 5xx statuses.
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.explanation)
    }
}

impl std::error::Error for HttpError {}

/// Errors that can occur while speaking the OTA protocol.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The request was rejected with a status code.
    #[error("{0}")]
    Http(#[from] HttpError),

    /// A shared secret did not have exactly 32 bytes.
    #[error("shared secret must be 32 bytes, got {0}")]
    InvalidSecretLength(usize),

    /// A shared secret or token was not valid hex.
    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),

    /// A file listing line did not match `<name> <40 hex>`.
    #[error("line has invalid format in file listing: '{0}'")]
    InvalidListingLine(String),

    /// I/O error on the underlying stream.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// Returns the status code that best describes this error on the wire.
    pub fn status(&self) -> u16 {
        match self {
            ProtocolError::Http(e) => e.status,
            ProtocolError::InvalidHex(_) | ProtocolError::InvalidListingLine(_) => 400,
            ProtocolError::InvalidSecretLength(_) | ProtocolError::Io(_) => 500,
        }
    }
}
