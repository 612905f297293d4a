//! Filesystem helpers with bounded memory use.

use otanode_protocol::{BlobHasher, ContentHash};
use std::fs::{self, File};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Suffix of the temporary sibling a PUT body is written to.
pub const PARTIAL_SUFFIX: &str = ".ota-partial";

/// A temporary sibling file that becomes the target only on [`commit`].
///
/// Dropping it without committing removes the temporary file, so a rejected
/// or truncated upload never leaves anything behind.
///
/// [`commit`]: PartialFile::commit
pub struct PartialFile {
    path: PathBuf,
    file: Option<File>,
}

impl PartialFile {
    /// Creates (or truncates) `<dir>/<name>.ota-partial`.
    pub fn create(dir: &Path, name: &str) -> io::Result<Self> {
        let path = dir.join(format!("{name}{PARTIAL_SUFFIX}"));
        let file = File::create(&path)?;
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    /// Syncs the data and renames it over `target`.
    ///
    /// Until the rename succeeds the old target stays intact.
    pub fn commit(mut self, target: &Path) -> io::Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        fs::rename(&self.path, target)?;
        if let Some(dir) = target.parent() {
            sync_directory(dir)?;
        }
        // Renamed away; nothing left for Drop to clean up.
        self.path = PathBuf::new();
        Ok(())
    }
}

impl Write for PartialFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.write(buf),
            None => Err(io::Error::new(ErrorKind::Other, "partial file already committed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.path.as_os_str().is_empty() {
            return;
        }
        self.file.take();
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove partial upload");
        }
    }
}

/// Makes renames and removals in `dir` durable.
#[cfg(unix)]
pub fn sync_directory(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

/// Directory fsync is not available here; the filesystem journal covers it.
#[cfg(not(unix))]
pub fn sync_directory(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// Hashes a file chunk by chunk, reusing `buf`.
pub fn hash_file(path: &Path, buf: &mut [u8]) -> io::Result<ContentHash> {
    let mut file = File::open(path)?;
    let mut hasher = BlobHasher::new(file.metadata()?.len());
    loop {
        let n = match file.read(buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    if !hasher.is_complete() {
        return Err(io::Error::new(
            ErrorKind::UnexpectedEof,
            "file changed size while hashing",
        ));
    }
    Ok(hasher.finalize())
}

/// Copies exactly `len` bytes from `reader` to `writer` through `buf`.
pub fn copy_exact<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    len: u64,
    buf: &mut [u8],
) -> io::Result<()> {
    let mut remaining = len;
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = match reader.read(&mut buf[..want]) {
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "file shorter than its metadata",
                ))
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        remaining -= n as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use otanode_protocol::blob_hash;

    #[test]
    fn commit_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("main.py");
        fs::write(&target, b"old").unwrap();

        let mut partial = PartialFile::create(dir.path(), "main.py").unwrap();
        partial.write_all(b"new content").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"old");
        partial.commit(&target).unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"new content");
        assert!(!dir.path().join("main.py.ota-partial").exists());
    }

    #[test]
    fn dropping_removes_partial() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("main.py");
        fs::write(&target, b"old").unwrap();

        {
            let mut partial = PartialFile::create(dir.path(), "main.py").unwrap();
            partial.write_all(b"half").unwrap();
            assert!(dir.path().join("main.py.ota-partial").exists());
        }

        assert!(!dir.path().join("main.py.ota-partial").exists());
        assert_eq!(fs::read(&target).unwrap(), b"old");
    }

    #[test]
    fn hash_file_matches_blob_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let content: Vec<u8> = (0..=255u8).cycle().take(5000).collect();
        fs::write(&path, &content).unwrap();

        let mut buf = [0u8; 7];
        assert_eq!(hash_file(&path, &mut buf).unwrap(), blob_hash(&content));
    }

    #[test]
    fn copy_exact_stops_at_len() {
        let mut reader: &[u8] = b"hello world";
        let mut out = Vec::new();
        let mut buf = [0u8; 3];
        copy_exact(&mut reader, &mut out, 5, &mut buf).unwrap();
        assert_eq!(out, b"hello");

        let mut reader: &[u8] = b"abc";
        let err = copy_exact(&mut reader, &mut Vec::new(), 5, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }
}
