//! # otanode testkit
//!
//! Test utilities for otanode.
//!
//! This crate provides:
//! - Readers and in-memory connections that deliver bytes in fixed chunks
//! - Device fixtures backed by temporary directories
//! - A loopback [`DeviceClient`](otanode_sync::DeviceClient) that talks raw
//!   HTTP to an in-process handler
//! - Reset collaborators that record reboots
//! - A device server on a loopback socket
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use otanode_testkit::prelude::*;
//!
//! let device = DeviceFixture::new();
//! device.write("main.py", b"print(1)\n");
//! let response = device.get("/ota-listing");
//! assert_eq!(response.status, 200);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod connection;
pub mod fixtures;
pub mod generators;
pub mod loopback;
pub mod tcp;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::connection::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::loopback::*;
    pub use crate::tcp::*;
}

pub use connection::*;
pub use fixtures::*;
pub use generators::*;
pub use loopback::*;
pub use tcp::*;
