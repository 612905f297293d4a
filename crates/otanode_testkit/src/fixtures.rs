//! Device and working-tree fixtures.
//!
//! Provides temporary device roots with a known secret, and helpers that
//! send raw requests through the device handler.

use crate::connection::MemoryConnection;
use otanode_device::{ConnectionOutcome, NodeConfig, OtaHandler};
use otanode_protocol::{auth_query, delete_token, put_token, SharedSecret};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The secret every fixture device shares with its tests.
pub const TEST_SECRET: [u8; 32] = [0x42; 32];

/// Returns [`TEST_SECRET`] as a [`SharedSecret`].
pub fn test_secret() -> SharedSecret {
    SharedSecret::new(TEST_SECRET)
}

/// A response captured from an in-memory connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// Status code.
    pub status: u16,
    /// Headers in order, names as sent.
    pub headers: Vec<(String, String)>,
    /// Body bytes.
    pub body: Vec<u8>,
    /// What the handler told the serving loop.
    pub outcome: ConnectionOutcome,
}

impl RawResponse {
    /// Parses the bytes a handler wrote.
    ///
    /// # Panics
    ///
    /// Panics if the output is not a complete response head.
    pub fn parse(output: &[u8], outcome: ConnectionOutcome) -> Self {
        let split = output
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("response has no header terminator");
        let head = std::str::from_utf8(&output[..split]).expect("response head is not UTF-8");
        let mut lines = head.split("\r\n");
        let status_line = lines.next().expect("empty response head");
        let status = status_line
            .split(' ')
            .nth(1)
            .and_then(|code| code.parse().ok())
            .expect("malformed status line");
        let headers = lines
            .filter_map(|line| line.split_once(": "))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        Self {
            status,
            headers,
            body: output[split + 4..].to_vec(),
            outcome,
        }
    }

    /// Returns the first header with this name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The body as text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A device root in a temporary directory with a handler over it.
pub struct DeviceFixture {
    handler: OtaHandler,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl DeviceFixture {
    /// Creates a device with the default configuration.
    pub fn new() -> Self {
        Self::with_config(NodeConfig::default())
    }

    /// Creates a device with the given configuration.
    pub fn with_config(config: NodeConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(
            temp_dir.path().join(&config.secret_file),
            format!("{}\n", test_secret().to_hex()),
        )
        .expect("Failed to write secret");
        let handler = OtaHandler::open(temp_dir.path(), config).expect("Failed to open device");
        Self {
            handler,
            _temp_dir: temp_dir,
        }
    }

    /// The device root.
    pub fn path(&self) -> &Path {
        self.handler.root()
    }

    /// The device handler.
    pub fn handler(&self) -> &OtaHandler {
        &self.handler
    }

    /// Opens a second handler over the same root, e.g. to hand to a server.
    pub fn open_handler(&self) -> OtaHandler {
        OtaHandler::open(self.path(), self.handler.config().clone()).expect("Failed to open device")
    }

    /// Writes a file into the device root, creating parent directories.
    pub fn write(&self, name: impl AsRef<Path>, content: &[u8]) -> PathBuf {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create directories");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Reads a file from the device root, if it exists.
    pub fn read(&self, name: impl AsRef<Path>) -> Option<Vec<u8>> {
        fs::read(self.path().join(name)).ok()
    }

    /// Returns true if the file exists in the device root.
    pub fn exists(&self, name: impl AsRef<Path>) -> bool {
        self.path().join(name).exists()
    }

    /// Names of every entry in the device root, sorted.
    pub fn entries(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.path())
            .expect("Failed to list device root")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Sends raw request bytes in one piece.
    pub fn request(&self, raw: &[u8]) -> RawResponse {
        self.request_chunked(raw, usize::MAX)
    }

    /// Sends raw request bytes `chunk` bytes per read.
    pub fn request_chunked(&self, raw: &[u8], chunk: usize) -> RawResponse {
        let mut conn = MemoryConnection::chunked(raw.to_vec(), chunk);
        let outcome = self.handler.handle_connection(&mut conn);
        RawResponse::parse(conn.output(), outcome)
    }

    /// Sends a GET for `target`.
    pub fn get(&self, target: &str) -> RawResponse {
        self.request(format!("GET {target} HTTP/1.1\r\n\r\n").as_bytes())
    }

    /// Sends a PUT signed with the test secret.
    pub fn put(&self, name: &str, content: &[u8], noop: bool) -> RawResponse {
        let token = put_token(&test_secret(), name, content, noop);
        self.put_with_query(name, content, &auth_query(&token, noop))
    }

    /// Sends a PUT with an arbitrary query string.
    pub fn put_with_query(&self, name: &str, content: &[u8], query: &str) -> RawResponse {
        let mut raw = format!(
            "PUT /ota/{name}?{query} HTTP/1.1\r\ncontent-length: {}\r\n\r\n",
            content.len()
        )
        .into_bytes();
        raw.extend_from_slice(content);
        self.request(&raw)
    }

    /// Sends a DELETE signed with the test secret.
    pub fn delete(&self, name: &str, noop: bool) -> RawResponse {
        let token = delete_token(&test_secret(), name, noop);
        self.delete_with_query(name, &auth_query(&token, noop))
    }

    /// Sends a DELETE with an arbitrary query string.
    pub fn delete_with_query(&self, name: &str, query: &str) -> RawResponse {
        self.request(format!("DELETE /ota/{name}?{query} HTTP/1.1\r\n\r\n").as_bytes())
    }
}

impl Default for DeviceFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A host working tree with a deploy listing.
pub struct WorkTree {
    dir: TempDir,
}

impl WorkTree {
    /// Creates a tree holding `files`, all of them named in the deploy listing.
    pub fn new(files: &[(&str, &[u8])]) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let tree = Self { dir };
        for (name, content) in files {
            tree.write(name, content);
        }
        tree.set_listing(&files.iter().map(|(name, _)| *name).collect::<Vec<_>>());
        tree
    }

    /// The tree root.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a file without touching the listing.
    pub fn write(&self, name: &str, content: &[u8]) {
        fs::write(self.path().join(name), content).expect("Failed to write file");
    }

    /// Replaces the deploy listing.
    pub fn set_listing(&self, names: &[&str]) {
        let mut listing = names.join("\n");
        listing.push('\n');
        fs::write(self.path().join("deploy-listing"), listing).expect("Failed to write listing");
    }
}
