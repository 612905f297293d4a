//! The host's device registry.
//!
//! A JSON document mapping device names to their address, shared secret and
//! sensors:
//!
//! ```json
//! {
//!   "balcony": {
//!     "address": "10.0.0.7:5000",
//!     "secret": "<64 hex chars>",
//!     "sensors": {
//!       "climate": { "type": "bme", "port": "I2C(0)", "description": "balcony" }
//!     }
//!   }
//! }
//! ```

use crate::error::{SyncError, SyncResult};
use crate::render::{render_config, SensorSpec};
use otanode_protocol::SharedSecret;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Port used when an entry has no explicit address.
pub const DEFAULT_DEVICE_PORT: u16 = 5000;

/// One device in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// `host:port`; defaults to `<device name>:5000`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Shared secret as 64 hex characters.
    pub secret: String,
    /// Sensors attached to the device, by name.
    #[serde(default)]
    pub sensors: BTreeMap<String, SensorSpec>,
}

impl DeviceEntry {
    /// Decodes the shared secret.
    pub fn shared_secret(&self) -> SyncResult<SharedSecret> {
        Ok(SharedSecret::from_hex(&self.secret)?)
    }
}

/// All known devices, by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, DeviceEntry>,
}

impl DeviceRegistry {
    /// Loads a registry file.
    pub fn load(path: &Path) -> SyncResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            SyncError::Registry(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&bytes)
    }

    /// Parses a registry document.
    pub fn from_json(bytes: &[u8]) -> SyncResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| SyncError::Registry(e.to_string()))
    }

    /// Adds or replaces a device.
    pub fn insert(&mut self, name: impl Into<String>, entry: DeviceEntry) {
        self.devices.insert(name.into(), entry);
    }

    /// Looks up a device.
    pub fn device(&self, name: &str) -> SyncResult<ResolvedDevice<'_>> {
        let (name, entry) = self
            .devices
            .get_key_value(name)
            .ok_or_else(|| SyncError::Registry(format!("device {name} not found in registry")))?;
        Ok(ResolvedDevice { name, entry })
    }

    /// Device names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }
}

/// A registry entry together with its name.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedDevice<'a> {
    /// Device name, also its hostname.
    pub name: &'a str,
    /// Registry entry.
    pub entry: &'a DeviceEntry,
}

impl ResolvedDevice<'_> {
    /// The address to connect to.
    pub fn address(&self) -> String {
        self.entry
            .address
            .clone()
            .unwrap_or_else(|| format!("{}:{DEFAULT_DEVICE_PORT}", self.name))
    }

    /// Decodes the shared secret.
    pub fn secret(&self) -> SyncResult<SharedSecret> {
        self.entry.shared_secret()
    }

    /// Renders the device's configuration file.
    pub fn render_config(&self) -> SyncResult<Vec<u8>> {
        render_config(self.name, &self.entry.sensors)
    }
}
