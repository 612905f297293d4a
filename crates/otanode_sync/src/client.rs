//! Talking to a device.
//!
//! The engine speaks to the device through the [`DeviceClient`] trait so
//! tests can route requests straight into an in-process handler. The
//! production implementation is [`HttpDeviceClient`], a blocking HTTP client.

use crate::error::{SyncError, SyncResult};
use std::fmt;
use std::io::Read;
use std::time::Duration;

/// Upper bound on a response body the host is willing to buffer.
const MAX_RESPONSE_BYTES: u64 = 16 * 1024 * 1024;

/// Request methods the device understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Read.
    Get,
    /// Write.
    Put,
    /// Remove.
    Delete,
}

impl Method {
    /// The method token.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRequest {
    /// Method.
    pub method: Method,
    /// Absolute path, e.g. `/ota/main.py`.
    pub path: String,
    /// Query string without the leading `?`.
    pub query: Option<String>,
    /// Request body (sent with a `content-length` for PUT).
    pub body: Vec<u8>,
}

impl DeviceRequest {
    /// A GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: None,
            body: Vec::new(),
        }
    }

    /// A PUT request.
    pub fn put(path: impl Into<String>, query: String, body: Vec<u8>) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            query: Some(query),
            body,
        }
    }

    /// A DELETE request.
    pub fn delete(path: impl Into<String>, query: String) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            query: Some(query),
            body: Vec::new(),
        }
    }

    /// Path and query as they appear in the request line.
    pub fn target(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{query}", self.path),
            None => self.path.clone(),
        }
    }
}

/// The device's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl DeviceResponse {
    /// Returns true for 200.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// The body as text, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends requests to one device, one at a time.
///
/// Non-200 statuses are returned as responses, not errors; only failing to
/// exchange a request at all is an error.
pub trait DeviceClient {
    /// Sends a request and waits for the whole response.
    fn send(&self, request: &DeviceRequest) -> SyncResult<DeviceResponse>;
}

impl<C: DeviceClient + ?Sized> DeviceClient for &C {
    fn send(&self, request: &DeviceRequest) -> SyncResult<DeviceResponse> {
        (**self).send(request)
    }
}

/// A blocking HTTP client for a device at `host:port`.
pub struct HttpDeviceClient {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpDeviceClient {
    /// Creates a client for the device at `address` (`host:port`).
    pub fn new(address: &str) -> Self {
        Self::with_timeout(address, Duration::from_secs(30))
    }

    /// Creates a client with a custom overall request timeout.
    pub fn with_timeout(address: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            base_url: format!("http://{address}"),
            agent,
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl DeviceClient for HttpDeviceClient {
    fn send(&self, request: &DeviceRequest) -> SyncResult<DeviceResponse> {
        let url = format!("{}{}", self.base_url, request.target());
        let result = self
            .agent
            .request(request.method.as_str(), &url)
            .send_bytes(&request.body);

        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            // The transport error already names the url.
            Err(ureq::Error::Transport(e)) => {
                return Err(SyncError::transport_retryable(e.to_string()))
            }
        };

        let status = response.status();
        let mut body = Vec::new();
        response
            .into_reader()
            .take(MAX_RESPONSE_BYTES)
            .read_to_end(&mut body)
            .map_err(|e| SyncError::transport_retryable(format!("{url}: {e}")))?;
        Ok(DeviceResponse { status, body })
    }
}
