//! The serving loop.

use crate::error::DeviceResult;
use crate::handler::{ConnectionOutcome, OtaHandler};
use crate::reset::Reset;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use tracing::{debug, error, info};

/// Serves one connection at a time until a reboot is requested.
///
/// There is no read timeout: a peer that stalls mid-request blocks every
/// later connection until it sends the rest or goes away.
///
/// # Example
///
/// ```no_run
/// use otanode_device::{NodeConfig, OtaHandler, OtaServer, ProcessReset};
///
/// let config = NodeConfig::load("/flash".as_ref()).unwrap();
/// let handler = OtaHandler::open("/flash", config).unwrap();
/// let server = OtaServer::bind(handler, ProcessReset).unwrap();
/// server.serve().unwrap();
/// ```
pub struct OtaServer<R: Reset> {
    listener: TcpListener,
    handler: OtaHandler,
    reset: R,
}

impl<R: Reset> OtaServer<R> {
    /// Binds the configured address.
    pub fn bind(handler: OtaHandler, reset: R) -> DeviceResult<Self> {
        let listener = TcpListener::bind(handler.config().bind_addr)?;
        Ok(Self::from_listener(listener, handler, reset))
    }

    /// Serves on an already bound listener.
    pub fn from_listener(listener: TcpListener, handler: OtaHandler, reset: R) -> Self {
        Self {
            listener,
            handler,
            reset,
        }
    }

    /// Returns the address the server listens on.
    pub fn local_addr(&self) -> DeviceResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts and fully handles the next connection.
    pub fn serve_one(&mut self) -> DeviceResult<ConnectionOutcome> {
        let (stream, peer) = self.listener.accept()?;
        debug!(%peer, "connection accepted");
        let mut guard = ConnectionGuard(stream);
        Ok(self.handler.handle_connection(&mut guard.0))
    }

    /// Runs until a reboot is acknowledged, then invokes the reset collaborator.
    ///
    /// The listening socket is released before returning. Failing to accept
    /// is fatal: the socket has to be acquired again from scratch.
    pub fn serve(mut self) -> DeviceResult<()> {
        info!(addr = ?self.listener.local_addr().ok(), "serving");
        loop {
            match self.serve_one() {
                Ok(ConnectionOutcome::Continue) => {}
                Ok(ConnectionOutcome::Reboot) => break,
                Err(e) => {
                    error!(error = %e, "accept failed");
                    return Err(e);
                }
            }
        }

        let Self {
            listener,
            handler: _,
            mut reset,
        } = self;
        drop(listener);
        reset.reset();
        Ok(())
    }
}

/// Closes the connection on every exit path.
struct ConnectionGuard(TcpStream);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.shutdown(Shutdown::Both) {
            debug!(error = %e, "shutdown after response");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use otanode_protocol::{blob_hash, SharedSecret};
    use std::io::{Read, Write};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn server<R: Reset>(reset: R) -> (tempfile::TempDir, OtaServer<R>) {
        let dir = tempfile::tempdir().unwrap();
        let handler = OtaHandler::new(
            dir.path(),
            NodeConfig::default(),
            SharedSecret::new([1u8; 32]),
        )
        .unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        (dir, OtaServer::from_listener(listener, handler, reset))
    }

    fn exchange(addr: SocketAddr, request: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(request).unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    #[test]
    fn serves_until_reboot() {
        let reset_called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&reset_called);
        let (dir, server) = server(move || flag.store(true, Ordering::SeqCst));
        std::fs::write(dir.path().join("main.py"), b"x").unwrap();
        let addr = server.local_addr().unwrap();

        let thread = std::thread::spawn(move || server.serve());

        let listing = exchange(addr, b"GET /ota-listing HTTP/1.1\r\n\r\n");
        assert!(listing.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(listing.ends_with(&format!("\r\n\r\nmain.py {}", blob_hash(b"x"))));

        let reboot = exchange(addr, b"GET /reboot HTTP/1.1\r\n\r\n");
        assert!(reboot.ends_with("rebooting"));

        thread.join().unwrap().unwrap();
        assert!(reset_called.load(Ordering::SeqCst));
        assert!(TcpStream::connect(addr).is_err());
    }

    #[test]
    fn bad_request_does_not_stop_the_loop() {
        let (_dir, mut server) = server(crate::reset::StopOnly);
        let addr = server.local_addr().unwrap();

        let client = std::thread::spawn(move || exchange(addr, b"GARBAGE\r\n\r\n"));
        assert_eq!(server.serve_one().unwrap(), ConnectionOutcome::Continue);
        assert!(client.join().unwrap().starts_with("HTTP/1.1 400 "));

        let client = std::thread::spawn(move || exchange(addr, b"GET /missing HTTP/1.1\r\n\r\n"));
        assert_eq!(server.serve_one().unwrap(), ConnectionOutcome::Continue);
        assert!(client.join().unwrap().starts_with("HTTP/1.1 404 "));
    }
}
