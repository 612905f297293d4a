//! Content-addressed object stores.
//!
//! The host identifies every tracked file by its blob hash. A store records
//! file contents under that hash so the previous version of a file can be
//! shown as a diff when it changes.

use crate::error::{SyncError, SyncResult};
use otanode_protocol::{blob_hash, ContentHash};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Stores and retrieves blobs by content hash.
pub trait ObjectStore {
    /// Hashes the file at `path`, recording its content in the store.
    fn hash_object(&self, path: &Path) -> SyncResult<ContentHash>;

    /// Reads a previously recorded blob, if the store has it.
    fn read_object(&self, hash: &ContentHash) -> SyncResult<Option<Vec<u8>>>;
}

/// The object database of a git repository, via the `git` binary.
#[derive(Debug, Clone)]
pub struct GitObjectStore {
    repo_dir: PathBuf,
}

impl GitObjectStore {
    /// Uses the repository containing `repo_dir`.
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    fn git(&self) -> Command {
        let mut command = Command::new("git");
        command.current_dir(&self.repo_dir);
        command
    }
}

impl ObjectStore for GitObjectStore {
    fn hash_object(&self, path: &Path) -> SyncResult<ContentHash> {
        let output = self
            .git()
            .arg("hash-object")
            .arg("-w")
            .arg("--")
            .arg(path)
            .output()
            .map_err(|e| SyncError::ObjectStore(format!("cannot run git: {e}")))?;
        if !output.status.success() {
            return Err(SyncError::ObjectStore(format!(
                "git hash-object {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        ContentHash::parse(stdout.trim()).ok_or_else(|| {
            SyncError::ObjectStore(format!("unexpected git hash-object output: {stdout}"))
        })
    }

    fn read_object(&self, hash: &ContentHash) -> SyncResult<Option<Vec<u8>>> {
        let output = self
            .git()
            .args(["cat-file", "blob", hash.as_str()])
            .output()
            .map_err(|e| SyncError::ObjectStore(format!("cannot run git: {e}")))?;
        if output.status.success() {
            Ok(Some(output.stdout))
        } else {
            debug!(%hash, "object not in repository");
            Ok(None)
        }
    }
}

/// An in-process object store.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<ContentHash, Vec<u8>>>,
}

impl MemoryObjectStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a blob and returns its hash.
    pub fn insert(&self, content: &[u8]) -> ContentHash {
        let hash = blob_hash(content);
        self.objects.write().insert(hash.clone(), content.to_vec());
        hash
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn hash_object(&self, path: &Path) -> SyncResult<ContentHash> {
        let content = std::fs::read(path)?;
        Ok(self.insert(&content))
    }

    fn read_object(&self, hash: &ContentHash) -> SyncResult<Option<Vec<u8>>> {
        Ok(self.objects.read().get(hash).cloned())
    }
}
