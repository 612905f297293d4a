//! Authentication of mutating OTA requests.
//!
//! Every PUT and DELETE carries a digest token minted by the host from the
//! shared secret and a canonical message describing the operation.
//!
//! ## Message Format
//!
//! - PUT: `[noop prefix] name " " content`
//! - DELETE: `[noop prefix] name`
//!
//! The noop prefix is the literal `noop ` and is present exactly when the
//! request carries `noop=yes`, so a token minted for a dry run can never
//! authorize a real mutation.
//!
//! ## Transport
//!
//! The token is sent as the `sparkle` query parameter, 64 lowercase hex
//! characters.

use crate::digest::{KeyedDigest, DIGEST_LEN};
use crate::error::HttpError;
use crate::request::QueryParams;
use crate::secret::SharedSecret;

/// Query parameter carrying the digest token.
pub const TOKEN_PARAM: &str = "sparkle";

/// Query parameter carrying the dry-run flag.
pub const NOOP_PARAM: &str = "noop";

/// Message prefix for dry-run operations.
pub const NOOP_PREFIX: &[u8] = b"noop ";

/// A digest token as carried in the `sparkle` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthToken([u8; DIGEST_LEN]);

impl AuthToken {
    /// Wraps raw digest bytes.
    pub fn new(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses a token from its 64-character lowercase hex form.
    ///
    /// # Errors
    ///
    /// Returns a 400 error for any other shape.
    pub fn from_hex(text: &str) -> Result<Self, HttpError> {
        let lowercase = text
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if text.len() != DIGEST_LEN * 2 || !lowercase {
            return Err(HttpError::bad_request("invalid sparkle format"));
        }
        let mut bytes = [0u8; DIGEST_LEN];
        hex::decode_to_slice(text, &mut bytes)
            .map_err(|_| HttpError::bad_request("invalid sparkle format"))?;
        Ok(Self(bytes))
    }

    /// Renders the token as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Returns the digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }
}

/// The authentication parameters of one mutating request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials {
    /// Supplied token.
    pub token: AuthToken,
    /// Whether the request is a dry run.
    pub noop: bool,
}

impl Credentials {
    /// Extracts `sparkle` and `noop` from a query.
    ///
    /// # Errors
    ///
    /// 400 if the token is missing or malformed, or `noop` is neither
    /// `yes` nor `no`.
    pub fn from_query(query: &QueryParams) -> Result<Self, HttpError> {
        let token = query
            .get(TOKEN_PARAM)
            .ok_or_else(|| HttpError::bad_request("missing sparkle"))?;
        let token = AuthToken::from_hex(token)?;
        let noop = match query.get(NOOP_PARAM) {
            None | Some("no") => false,
            Some("yes") => true,
            Some(_) => return Err(HttpError::bad_request("noop must be yes or no")),
        };
        Ok(Self { token, noop })
    }
}

fn begin(secret: &SharedSecret, name: &str, noop: bool) -> KeyedDigest {
    let mut digest = KeyedDigest::new(secret);
    if noop {
        digest.update(NOOP_PREFIX);
    }
    digest.update(name.as_bytes());
    digest
}

/// Starts a PUT digest; the caller streams the content into it.
pub fn begin_put_digest(secret: &SharedSecret, name: &str, noop: bool) -> KeyedDigest {
    let mut digest = begin(secret, name, noop);
    digest.update(b" ");
    digest
}

/// Computes the token for writing `content` to `name`.
pub fn put_token(secret: &SharedSecret, name: &str, content: &[u8], noop: bool) -> AuthToken {
    let mut digest = begin_put_digest(secret, name, noop);
    digest.update(content);
    AuthToken(digest.finalize())
}

/// Starts a DELETE digest.
pub fn delete_digest(secret: &SharedSecret, name: &str, noop: bool) -> KeyedDigest {
    begin(secret, name, noop)
}

/// Computes the token for deleting `name`.
pub fn delete_token(secret: &SharedSecret, name: &str, noop: bool) -> AuthToken {
    AuthToken(delete_digest(secret, name, noop).finalize())
}

/// Builds the query string for a mutating request.
pub fn auth_query(token: &AuthToken, noop: bool) -> String {
    let noop = if noop { "yes" } else { "no" };
    format!("{TOKEN_PARAM}={}&{NOOP_PARAM}={noop}", token.to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::keyed_digest;

    fn secret() -> SharedSecret {
        SharedSecret::new([0x11; 32])
    }

    #[test]
    fn put_message_layout() {
        let token = put_token(&secret(), "test.txt", b"hello", false);
        assert_eq!(*token.as_bytes(), keyed_digest(&secret(), b"test.txt hello"));

        let token = put_token(&secret(), "test.txt", b"hello", true);
        assert_eq!(
            *token.as_bytes(),
            keyed_digest(&secret(), b"noop test.txt hello")
        );
    }

    #[test]
    fn delete_message_layout() {
        let token = delete_token(&secret(), "test.txt", false);
        assert_eq!(*token.as_bytes(), keyed_digest(&secret(), b"test.txt"));
        assert_ne!(token, delete_token(&secret(), "test.txt", true));
    }

    #[test]
    fn streamed_put_digest_verifies() {
        let token = put_token(&secret(), "main.py", b"print(1)\n", false);
        let mut digest = begin_put_digest(&secret(), "main.py", false);
        digest.update(b"print");
        digest.update(b"(1)\n");
        assert!(digest.verify(token.as_bytes()));
    }

    #[test]
    fn token_hex_shape() {
        let token = put_token(&secret(), "a", b"", false);
        assert_eq!(AuthToken::from_hex(&token.to_hex()), Ok(token));

        assert_eq!(AuthToken::from_hex("00").unwrap_err().status, 400);
        assert_eq!(
            AuthToken::from_hex(&token.to_hex().to_uppercase())
                .unwrap_err()
                .status,
            400
        );
        assert!(AuthToken::from_hex(&"g".repeat(64)).is_err());
    }

    #[test]
    fn credentials_from_query() {
        let token = delete_token(&secret(), "x", true);
        let query = QueryParams::parse(auth_query(&token, true).as_bytes());
        assert_eq!(
            Credentials::from_query(&query),
            Ok(Credentials { token, noop: true })
        );

        let query = QueryParams::parse(format!("sparkle={}", token.to_hex()).as_bytes());
        assert!(!Credentials::from_query(&query).unwrap().noop);

        let query = QueryParams::parse(format!("sparkle={}&noop=maybe", token.to_hex()).as_bytes());
        assert_eq!(Credentials::from_query(&query).unwrap_err().status, 400);

        let query = QueryParams::parse(b"noop=yes");
        assert_eq!(Credentials::from_query(&query).unwrap_err().status, 400);
    }
}
