//! The shared secret held by host and device.

use crate::error::{ProtocolError, ProtocolResult};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a shared secret in bytes.
pub const SECRET_LEN: usize = 32;

/// A 32-byte secret provisioned out-of-band on both ends.
///
/// Never transmitted; only digests derived from it cross the wire.
/// The bytes are wiped when the value is dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; SECRET_LEN]);

impl SharedSecret {
    /// Wraps an exact 32-byte array.
    pub fn new(bytes: [u8; SECRET_LEN]) -> Self {
        Self(bytes)
    }

    /// Creates a secret from a slice.
    ///
    /// # Errors
    ///
    /// Fails with [`ProtocolError::InvalidSecretLength`] unless the slice is
    /// exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> ProtocolResult<Self> {
        let array: [u8; SECRET_LEN] = bytes
            .try_into()
            .map_err(|_| ProtocolError::InvalidSecretLength(bytes.len()))?;
        Ok(Self(array))
    }

    /// Parses a secret written as 64 hex characters.
    pub fn from_hex(text: &str) -> ProtocolResult<Self> {
        let mut bytes =
            hex::decode(text.trim()).map_err(|e| ProtocolError::InvalidHex(e.to_string()))?;
        let secret = Self::from_slice(&bytes);
        bytes.zeroize();
        secret
    }

    /// Parses the contents of a secret file.
    ///
    /// Accepts either the 32 raw bytes or their hex rendering, with optional
    /// surrounding whitespace.
    pub fn from_file_contents(contents: &[u8]) -> ProtocolResult<Self> {
        if contents.len() == SECRET_LEN {
            return Self::from_slice(contents);
        }
        let text = std::str::from_utf8(contents)
            .map_err(|_| ProtocolError::InvalidSecretLength(contents.len()))?;
        Self::from_hex(text)
    }

    /// Returns the raw secret bytes.
    pub fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.0
    }

    /// Renders the secret as lowercase hex, for provisioning.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}
