//! # otanode device
//!
//! The OTA side of an otanode sensor node.
//!
//! This crate provides:
//! - The per-connection OTA request handler (listing, read, write, delete,
//!   config, reboot, static files)
//! - A sequential serving loop
//! - Node configuration loaded from `node.json`
//! - The reset collaborator invoked after a reboot request
//!
//! # Architecture
//!
//! The device runs a single accept loop. One connection is parsed,
//! dispatched and closed before the next one is accepted, so the
//! filesystem has exactly one mutator at a time. All buffering is bounded by
//! the configured chunk size.
//!
//! # Authentication
//!
//! PUT and DELETE are authenticated with a keyed digest over the operation,
//! using the 32-byte secret stored in the root (by default `ota_secret`).
//! The secret file is never listed, read or written over OTA.
//!
//! ```rust,ignore
//! use otanode_device::{NodeConfig, OtaHandler, OtaServer, ProcessReset};
//!
//! let config = NodeConfig::load(root)?;
//! let handler = OtaHandler::open(root, config)?;
//! OtaServer::bind(handler, ProcessReset)?.serve()?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod files;
mod handler;
mod reset;
mod server;

pub use config::{NodeConfig, DEFAULT_PORT, NODE_CONFIG_FILE};
pub use error::{DeviceError, DeviceResult};
pub use files::PARTIAL_SUFFIX;
pub use handler::{ConnectionOutcome, OtaHandler};
pub use reset::{ProcessReset, Reset, StopOnly};
pub use server::OtaServer;
