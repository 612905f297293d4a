//! Keyed message digest (HMAC-SHA256).
//!
//! The digest is the standard keyed-hash construction: the secret is
//! zero-extended to the SHA-256 block size and XOR-ed with the inner
//! (`0x36`) and outer (`0x5c`) pads, giving
//! `SHA256(opad || SHA256(ipad || message))`.

use crate::error::ProtocolResult;
use crate::secret::SharedSecret;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of a keyed digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// A streaming keyed digest over a message built from several `update` calls.
#[derive(Clone)]
pub struct KeyedDigest {
    mac: HmacSha256,
}

impl KeyedDigest {
    /// Starts a digest keyed with the shared secret.
    #[allow(clippy::expect_used)]
    pub fn new(secret: &SharedSecret) -> Self {
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        Self { mac }
    }

    /// Starts a digest from a raw key slice.
    ///
    /// # Errors
    ///
    /// Fails unless the key is exactly 32 bytes.
    pub fn from_key_slice(key: &[u8]) -> ProtocolResult<Self> {
        Ok(Self::new(&SharedSecret::from_slice(key)?))
    }

    /// Feeds more message bytes.
    pub fn update(&mut self, data: &[u8]) {
        self.mac.update(data);
    }

    /// Finishes the digest.
    pub fn finalize(self) -> [u8; DIGEST_LEN] {
        self.mac.finalize().into_bytes().into()
    }

    /// Finishes the digest and compares it with `expected` in constant time.
    pub fn verify(self, expected: &[u8]) -> bool {
        self.mac.verify_slice(expected).is_ok()
    }
}

/// Computes the keyed digest of a single message.
pub fn keyed_digest(secret: &SharedSecret, message: &[u8]) -> [u8; DIGEST_LEN] {
    let mut digest = KeyedDigest::new(secret);
    digest.update(message);
    digest.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sha2::Digest;

    /// The construction written out by hand, to pin the HMAC parameters.
    fn reference(key: &[u8; 32], message: &[u8]) -> [u8; 32] {
        let mut padded = [0u8; 64];
        padded[..32].copy_from_slice(key);
        let ipad: Vec<u8> = padded.iter().map(|b| b ^ 0x36).collect();
        let opad: Vec<u8> = padded.iter().map(|b| b ^ 0x5c).collect();

        let inner = Sha256::new().chain_update(&ipad).chain_update(message).finalize();
        Sha256::new().chain_update(&opad).chain_update(inner).finalize().into()
    }

    #[test]
    fn matches_reference_construction() {
        let key = [0x42u8; 32];
        let secret = SharedSecret::new(key);
        let message = b"test.txt hello";
        assert_eq!(keyed_digest(&secret, message), reference(&key, message));
    }

    #[test]
    fn from_key_slice_matches_reference() {
        let key: Vec<u8> = (0u8..32).collect();
        let digest = KeyedDigest::from_key_slice(&key).map(|mut d| {
            d.update(b"abc");
            d.finalize()
        });
        let expected = reference(&key.clone().try_into().unwrap(), b"abc");
        assert_eq!(digest.unwrap(), expected);
    }

    #[test]
    fn streaming_equals_one_shot() {
        let secret = SharedSecret::new([9u8; 32]);
        let mut digest = KeyedDigest::new(&secret);
        digest.update(b"config.json");
        digest.update(b" ");
        digest.update(b"{}");
        assert_eq!(digest.finalize(), keyed_digest(&secret, b"config.json {}"));
    }

    #[test]
    fn rejects_short_key() {
        assert!(KeyedDigest::from_key_slice(&[1u8; 16]).is_err());
    }

    #[test]
    fn verify_constant_time_compare() {
        let secret = SharedSecret::new([1u8; 32]);
        let good = keyed_digest(&secret, b"x");
        let mut digest = KeyedDigest::new(&secret);
        digest.update(b"x");
        assert!(digest.clone().verify(&good));

        let mut bad = good;
        bad[0] ^= 1;
        assert!(!digest.verify(&bad));
    }

    proptest! {
        #[test]
        fn single_bit_flip_in_message_changes_digest(
            message in proptest::collection::vec(any::<u8>(), 1..256),
            bit in any::<prop::sample::Index>(),
        ) {
            let secret = SharedSecret::new([3u8; 32]);
            let mut flipped = message.clone();
            let bit = bit.index(message.len() * 8);
            flipped[bit / 8] ^= 1 << (bit % 8);
            prop_assert_ne!(keyed_digest(&secret, &message), keyed_digest(&secret, &flipped));
        }

        #[test]
        fn single_bit_flip_in_key_changes_digest(bit in 0usize..256) {
            let key = [0x5au8; 32];
            let mut flipped = key;
            flipped[bit / 8] ^= 1 << (bit % 8);
            let message = b"ota/main.py";
            prop_assert_ne!(
                keyed_digest(&SharedSecret::new(key), message),
                keyed_digest(&SharedSecret::new(flipped), message)
            );
        }
    }
}
