//! # otanode sync
//!
//! Host-side deployment for otanode devices.
//!
//! This crate provides:
//! - A device registry (addresses, secrets, sensor wiring)
//! - Rendering of the per-device `config.json`
//! - A blocking HTTP client for the device's OTA endpoints
//! - Content-addressed object stores backed by git or memory
//! - The sync engine that diffs listings and pushes, deletes and reboots
//!
//! ## Sync model
//!
//! The working tree is authoritative. A run compares the local listing
//! (files named in the deploy listing plus the rendered config) with the
//! device's listing by content hash, pushes what differs, deletes what the
//! device has but the tree does not, and finally asks the device to
//! reboot. Running it twice in a row is a no-op the second time.
//!
//! Dry runs send the same requests with `noop=yes`, so the device checks
//! every digest but changes nothing, and skip the reboot.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod client;
mod config;
mod engine;
mod error;
mod registry;
mod render;
mod store;

pub use client::{DeviceClient, DeviceRequest, DeviceResponse, HttpDeviceClient, Method};
pub use config::SyncConfig;
pub use engine::{unified_diff, FileAction, FileReport, LocalFiles, SyncEngine, SyncReport};
pub use error::{SyncError, SyncResult};
pub use registry::{DeviceEntry, DeviceRegistry, ResolvedDevice, DEFAULT_DEVICE_PORT};
pub use render::{render_config, Port, PortType, SensorKind, SensorSpec};
pub use store::{GitObjectStore, MemoryObjectStore, ObjectStore};
