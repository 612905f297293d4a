//! Node configuration.

use crate::error::{DeviceError, DeviceResult};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Name of the optional node configuration file in the device root.
pub const NODE_CONFIG_FILE: &str = "node.json";

/// Default OTA port.
pub const DEFAULT_PORT: u16 = 5000;

/// Configuration for a sensor node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Address to listen on.
    pub bind_addr: SocketAddr,
    /// Read chunk size; also the request line and header line limit.
    pub chunk_size: usize,
    /// Name of the shared secret file in the root.
    pub secret_file: String,
    /// Directory served by the static fallback, relative to the root.
    pub web_root: PathBuf,
    /// Resource served for the empty path.
    pub index: String,
    /// Name of the rendered configuration file served at `/config`.
    pub config_file: String,
    /// Files OTA may neither read, write, delete nor list.
    pub reserved_files: Vec<String>,
}

impl NodeConfig {
    /// Creates a configuration listening on `bind_addr`.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            chunk_size: 1024,
            secret_file: "ota_secret".into(),
            web_root: PathBuf::from("www"),
            index: "index.html".into(),
            config_file: "config.json".into(),
            reserved_files: vec![NODE_CONFIG_FILE.into()],
        }
    }

    /// Loads `<root>/node.json`, falling back to defaults when it is absent.
    pub fn load(root: &Path) -> DeviceResult<Self> {
        let path = root.join(NODE_CONFIG_FILE);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Sets the chunk size.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Sets the secret file name.
    pub fn with_secret_file(mut self, name: impl Into<String>) -> Self {
        self.secret_file = name.into();
        self
    }

    /// Sets the web root directory.
    pub fn with_web_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.web_root = dir.into();
        self
    }

    /// Sets the index resource.
    pub fn with_index(mut self, name: impl Into<String>) -> Self {
        self.index = name.into();
        self
    }

    /// Sets the configuration file name.
    pub fn with_config_file(mut self, name: impl Into<String>) -> Self {
        self.config_file = name.into();
        self
    }

    /// Adds a reserved file.
    pub fn with_reserved_file(mut self, name: impl Into<String>) -> Self {
        self.reserved_files.push(name.into());
        self
    }

    /// Checks that the configuration can drive a handler.
    pub fn validate(&self) -> DeviceResult<()> {
        if self.chunk_size == 0 {
            return Err(DeviceError::Config("chunk_size must be at least 1".into()));
        }
        if self.secret_file.is_empty() {
            return Err(DeviceError::Config("secret_file must not be empty".into()));
        }
        Ok(())
    }

    /// Returns true if OTA must never expose or touch `name`.
    pub fn is_protected(&self, name: &str) -> bool {
        name == self.secret_file
            || name == NODE_CONFIG_FILE
            || self.reserved_files.iter().any(|reserved| reserved == name)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.bind_addr.port(), 5000);
        assert_eq!(config.chunk_size, 1024);
        assert!(config.is_protected("ota_secret"));
        assert!(config.is_protected("node.json"));
        assert!(!config.is_protected("main.py"));
    }

    #[test]
    fn config_builder() {
        let config = NodeConfig::new("127.0.0.1:8080".parse().unwrap())
            .with_chunk_size(64)
            .with_secret_file("glitter")
            .with_reserved_file("boot.py");

        assert_eq!(config.chunk_size, 64);
        assert!(config.is_protected("glitter"));
        assert!(!config.is_protected("ota_secret"));
        assert!(config.is_protected("boot.py"));
    }

    #[test]
    fn validation() {
        assert!(NodeConfig::default().validate().is_ok());
        assert!(NodeConfig::default().with_chunk_size(0).validate().is_err());
        assert!(NodeConfig::default().with_secret_file("").validate().is_err());
    }

    #[test]
    fn load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(NODE_CONFIG_FILE),
            br#"{ "chunk_size": 256, "web_root": "static" }"#,
        )
        .unwrap();

        let config = NodeConfig::load(dir.path()).unwrap();
        assert_eq!(config.chunk_size, 256);
        assert_eq!(config.web_root, PathBuf::from("static"));
        assert_eq!(config.secret_file, "ota_secret");
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(NodeConfig::load(dir.path()).unwrap(), NodeConfig::default());
    }

    #[test]
    fn load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(NODE_CONFIG_FILE), b"{ chunk_size").unwrap();
        assert!(NodeConfig::load(dir.path()).is_err());
    }
}
