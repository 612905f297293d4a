//! File listings and the changes between two of them.

use crate::blob::ContentHash;
use crate::error::{ProtocolError, ProtocolResult};
use crate::filename::is_ota_filename;
use std::collections::btree_map::{self, BTreeMap};

/// Filename to content hash, ordered by filename.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileListing {
    entries: BTreeMap<String, ContentHash>,
}

impl FileListing {
    /// Creates an empty listing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry.
    pub fn insert(&mut self, name: impl Into<String>, hash: ContentHash) -> Option<ContentHash> {
        self.entries.insert(name.into(), hash)
    }

    /// Looks up the hash of `name`.
    pub fn get(&self, name: &str) -> Option<&ContentHash> {
        self.entries.get(name)
    }

    /// Returns true if `name` is listed.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the listing is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in filename order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, ContentHash> {
        self.entries.iter()
    }

    /// Renders the wire form: `name hash` lines joined by `\n`.
    pub fn to_body(&self) -> String {
        self.entries
            .iter()
            .map(|(name, hash)| format_line(name, hash))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parses the wire form. An empty body is an empty listing.
    ///
    /// # Errors
    ///
    /// Fails on the first line that is not `<name> <40 lowercase hex>`.
    pub fn parse(body: &str) -> ProtocolResult<Self> {
        let mut listing = Self::new();
        for line in body.lines().filter(|line| !line.is_empty()) {
            let invalid = || ProtocolError::InvalidListingLine(line.to_string());
            let (name, hash) = line.split_once(' ').ok_or_else(invalid)?;
            if !is_ota_filename(name) {
                return Err(invalid());
            }
            let hash = ContentHash::parse(hash).ok_or_else(invalid)?;
            listing.insert(name, hash);
        }
        Ok(listing)
    }
}

/// Formats one listing line without a terminator.
pub fn format_line(name: &str, hash: &ContentHash) -> String {
    format!("{name} {hash}")
}

impl FromIterator<(String, ContentHash)> for FileListing {
    fn from_iter<I: IntoIterator<Item = (String, ContentHash)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a FileListing {
    type Item = (&'a String, &'a ContentHash);
    type IntoIter = btree_map::Iter<'a, String, ContentHash>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// The minimal set of operations that makes a remote listing match a local one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Files that are new or whose hash differs, in filename order.
    pub to_push: Vec<String>,
    /// Files present only remotely, in filename order.
    pub to_delete: Vec<String>,
}

impl ChangeSet {
    /// Diffs `local` (desired) against `remote` (current).
    pub fn between(local: &FileListing, remote: &FileListing) -> Self {
        let to_push = local
            .iter()
            .filter(|(name, hash)| remote.get(name) != Some(*hash))
            .map(|(name, _)| name.clone())
            .collect();
        let to_delete = remote
            .iter()
            .filter(|(name, _)| !local.contains(name))
            .map(|(name, _)| name.clone())
            .collect();
        Self { to_push, to_delete }
    }

    /// Returns true if nothing needs to change.
    pub fn is_empty(&self) -> bool {
        self.to_push.is_empty() && self.to_delete.is_empty()
    }

    /// Total number of operations.
    pub fn len(&self) -> usize {
        self.to_push.len() + self.to_delete.len()
    }
}
