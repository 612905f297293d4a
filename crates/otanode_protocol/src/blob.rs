//! Content addressing compatible with git blob object ids.
//!
//! A file's address is `SHA1("blob " || <decimal length> || NUL || content)`
//! rendered as 40 lowercase hex characters, byte-for-byte what
//! `git hash-object` prints for the same file.

use sha1::{Digest, Sha1};
use std::fmt;
use std::str::FromStr;

/// Length of a content hash in hex characters.
pub const CONTENT_HASH_HEX_LEN: usize = 40;

/// A validated content address (40 lowercase hex characters).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    /// Parses a hash, returning `None` unless it is 40 lowercase hex chars.
    pub fn parse(text: &str) -> Option<Self> {
        let valid = text.len() == CONTENT_HASH_HEX_LEN
            && text
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(text.to_string()))
    }

    /// Returns the hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentHash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("not a content hash: '{s}'"))
    }
}

/// Incremental blob hasher for content whose length is known up front.
///
/// Lets the device hash files chunk by chunk without loading them.
pub struct BlobHasher {
    hasher: Sha1,
    expected_len: u64,
    seen: u64,
}

impl BlobHasher {
    /// Starts hashing a blob of `len` bytes.
    pub fn new(len: u64) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(format!("blob {len}\0").as_bytes());
        Self {
            hasher,
            expected_len: len,
            seen: 0,
        }
    }

    /// Feeds the next chunk of content.
    pub fn update(&mut self, chunk: &[u8]) {
        self.seen += chunk.len() as u64;
        self.hasher.update(chunk);
    }

    /// Number of content bytes fed so far.
    pub fn bytes_seen(&self) -> u64 {
        self.seen
    }

    /// Returns true once exactly the announced number of bytes was fed.
    pub fn is_complete(&self) -> bool {
        self.seen == self.expected_len
    }

    /// Finishes the hash.
    pub fn finalize(self) -> ContentHash {
        ContentHash(hex::encode(self.hasher.finalize()))
    }
}

/// Hashes a complete in-memory blob.
pub fn blob_hash(content: &[u8]) -> ContentHash {
    let mut hasher = BlobHasher::new(content.len() as u64);
    hasher.update(content);
    hasher.finalize()
}
