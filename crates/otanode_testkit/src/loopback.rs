//! In-process host/device wiring.

use crate::connection::MemoryConnection;
use otanode_device::{ConnectionOutcome, OtaHandler, Reset};
use otanode_sync::{DeviceClient, DeviceRequest, DeviceResponse, Method, SyncError, SyncResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Encodes a host request as the raw bytes a device reads.
pub fn encode_request(request: &DeviceRequest) -> Vec<u8> {
    let mut raw = format!(
        "{} {} HTTP/1.1\r\nhost: loopback\r\n",
        request.method,
        request.target()
    );
    if request.method == Method::Put {
        raw.push_str(&format!("content-length: {}\r\n", request.body.len()));
    }
    raw.push_str("\r\n");
    let mut raw = raw.into_bytes();
    raw.extend_from_slice(&request.body);
    raw
}

/// Decodes a device response for the host.
pub fn decode_response(output: &[u8]) -> SyncResult<DeviceResponse> {
    let split = output
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or_else(|| SyncError::transport_fatal("incomplete response head"))?;
    let status = std::str::from_utf8(&output[..split])
        .ok()
        .and_then(|head| head.split(' ').nth(1))
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| SyncError::transport_fatal("malformed status line"))?;
    Ok(DeviceResponse {
        status,
        body: output[split + 4..].to_vec(),
    })
}

/// A [`DeviceClient`] that serves every request with an in-process handler.
///
/// Each request gets its own connection, fed to the handler `chunk` bytes
/// per read, the way a real device sees a slow network.
pub struct LoopbackClient<'a> {
    handler: &'a OtaHandler,
    chunk: usize,
    reboots: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl<'a> LoopbackClient<'a> {
    /// Creates a client delivering each request in one piece.
    pub fn new(handler: &'a OtaHandler) -> Self {
        Self::chunked(handler, usize::MAX)
    }

    /// Creates a client delivering requests `chunk` bytes per read.
    pub fn chunked(handler: &'a OtaHandler, chunk: usize) -> Self {
        Self {
            handler,
            chunk,
            reboots: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Number of reboots the handler acknowledged.
    pub fn reboots(&self) -> usize {
        self.reboots.load(Ordering::SeqCst)
    }

    /// `METHOD /path` of every request sent, in order.
    pub fn requests(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

impl DeviceClient for LoopbackClient<'_> {
    fn send(&self, request: &DeviceRequest) -> SyncResult<DeviceResponse> {
        self.log
            .lock()
            .push(format!("{} {}", request.method, request.path));
        let mut conn = MemoryConnection::chunked(encode_request(request), self.chunk);
        if self.handler.handle_connection(&mut conn) == ConnectionOutcome::Reboot {
            self.reboots.fetch_add(1, Ordering::SeqCst);
        }
        decode_response(conn.output())
    }
}

/// A reset collaborator that counts resets instead of performing them.
#[derive(Debug, Clone, Default)]
pub struct RecordingReset {
    count: Arc<AtomicUsize>,
}

impl RecordingReset {
    /// Creates a recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resets so far, across all clones.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Reset for RecordingReset {
    fn reset(&mut self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}
