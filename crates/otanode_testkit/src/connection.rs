//! Byte streams with controlled chunking.
//!
//! The request parser must behave the same however the peer's bytes are
//! split across reads; these types make the split explicit.

use std::io::{self, Read, Write};

/// A reader that returns at most `chunk` bytes per `read` call.
#[derive(Debug, Clone)]
pub struct ChunkedReader {
    data: Vec<u8>,
    pos: usize,
    chunk: usize,
}

impl ChunkedReader {
    /// Creates a reader over `data` delivering `chunk` bytes at a time.
    ///
    /// # Panics
    ///
    /// Panics if `chunk` is zero.
    pub fn new(data: impl Into<Vec<u8>>, chunk: usize) -> Self {
        assert!(chunk > 0, "chunk size must be positive");
        Self {
            data: data.into(),
            pos: 0,
            chunk,
        }
    }

    /// Returns the bytes not read yet.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }
}

impl Read for ChunkedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.chunk).min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// A full-duplex in-memory connection: scripted input, captured output.
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    input: ChunkedReader,
    output: Vec<u8>,
}

impl MemoryConnection {
    /// Creates a connection delivering `request` in one piece per read.
    pub fn new(request: impl Into<Vec<u8>>) -> Self {
        Self::chunked(request, usize::MAX)
    }

    /// Creates a connection delivering `request` `chunk` bytes at a time.
    pub fn chunked(request: impl Into<Vec<u8>>, chunk: usize) -> Self {
        Self {
            input: ChunkedReader::new(request, chunk),
            output: Vec::new(),
        }
    }

    /// Everything written to the connection.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Request bytes the handler never read.
    pub fn unread(&self) -> &[u8] {
        self.input.remaining()
    }

    /// Consumes the connection and returns the output.
    pub fn into_output(self) -> Vec<u8> {
        self.output
    }
}

impl Read for MemoryConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for MemoryConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
