//! Hash command implementation.

use otanode_protocol::{blob_hash, ContentHash};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// One hashed file.
#[derive(Debug, Serialize)]
pub struct HashEntry {
    /// File path as given.
    pub path: String,
    /// Content hash.
    pub hash: String,
    /// Size in bytes.
    pub size: u64,
}

/// Hashes a single file.
pub fn hash_path(path: &Path) -> Result<(ContentHash, u64), Box<dyn std::error::Error>> {
    let content = fs::read(path).map_err(|e| format!("Cannot read {:?}: {}", path, e))?;
    Ok((blob_hash(&content), content.len() as u64))
}

/// Runs the hash command.
pub fn run(files: &[impl AsRef<Path>], format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut entries = Vec::with_capacity(files.len());
    for file in files {
        let path = file.as_ref();
        let (hash, size) = hash_path(path)?;
        entries.push(HashEntry {
            path: path.display().to_string(),
            hash: hash.to_string(),
            size,
        });
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&entries)?),
        "text" => {
            for entry in &entries {
                println!("{} {}", entry.path, entry.hash);
            }
        }
        other => return Err(format!("Unknown format '{}'", other).into()),
    }
    Ok(())
}
