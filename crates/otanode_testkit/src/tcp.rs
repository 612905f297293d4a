//! Real sockets on loopback.

use otanode_device::{DeviceResult, OtaHandler, OtaServer, Reset};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::JoinHandle;

/// A device server running on its own thread.
pub struct RunningServer {
    addr: SocketAddr,
    thread: JoinHandle<DeviceResult<()>>,
}

impl RunningServer {
    /// Binds an ephemeral loopback port and serves until a reboot.
    pub fn spawn<R: Reset + Send + 'static>(handler: OtaHandler, reset: R) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind loopback");
        let addr = listener.local_addr().expect("Failed to read local address");
        let server = OtaServer::from_listener(listener, handler, reset);
        let thread = std::thread::spawn(move || server.serve());
        Self { addr, thread }
    }

    /// The listening address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Sends a request on a fresh connection and reads until the device
    /// closes it.
    pub fn exchange(&self, request: &[u8]) -> Vec<u8> {
        let mut stream = TcpStream::connect(self.addr).expect("Failed to connect");
        stream.write_all(request).expect("Failed to send request");
        let mut response = Vec::new();
        stream
            .read_to_end(&mut response)
            .expect("Failed to read response");
        response
    }

    /// Asks the device to reboot and waits for the serving loop to finish.
    pub fn reboot_and_join(self) -> DeviceResult<()> {
        let response = self.exchange(b"GET /reboot HTTP/1.1\r\n\r\n");
        assert!(response.ends_with(b"rebooting"), "reboot was not acknowledged");
        self.join()
    }

    /// Waits for the serving loop to finish on its own.
    pub fn join(self) -> DeviceResult<()> {
        self.thread.join().expect("Server thread panicked")
    }
}
