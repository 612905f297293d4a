//! # otanode protocol
//!
//! Wire-level building blocks shared by the otanode device and the host
//! sync tool. Nothing in this crate opens a socket or touches a filesystem.
//!
//! This crate provides:
//! - An incremental HTTP/1.1 request head parser with a hard memory bound
//! - HMAC-SHA256 keyed digests and the OTA authentication message layout
//! - Git-compatible blob content hashes
//! - File listings and the change set between two of them
//! - Filename policy and response framing
//!
//! # Parsing
//!
//! ```rust
//! use otanode_protocol::RequestHeadParser;
//!
//! let mut stream: &[u8] = b"PUT /ota/main.py HTTP/1.1\r\ncontent-length: 2\r\n\r\nok";
//! let head = RequestHeadParser::new(256).parse(&mut stream).unwrap();
//! assert_eq!(head.path_str(), ["ota", "main.py"]);
//! assert_eq!(head.content_length, 2);
//! assert_eq!(head.leftover, b"ok");
//! ```
//!
//! # Authentication
//!
//! ```rust
//! use otanode_protocol::{put_token, SharedSecret};
//!
//! let secret = SharedSecret::new([7u8; 32]);
//! let token = put_token(&secret, "main.py", b"print(1)\n", false);
//! assert_eq!(token.to_hex().len(), 64);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod blob;
mod digest;
mod error;
mod filename;
mod grammar;
mod listing;
mod parser;
mod request;
mod response;
mod secret;

pub use auth::{
    auth_query, begin_put_digest, delete_digest, delete_token, put_token, AuthToken, Credentials,
    NOOP_PARAM, NOOP_PREFIX, TOKEN_PARAM,
};
pub use blob::{blob_hash, BlobHasher, ContentHash, CONTENT_HASH_HEX_LEN};
pub use digest::{keyed_digest, KeyedDigest, DIGEST_LEN};
pub use error::{HttpError, ProtocolError, ProtocolResult};
pub use filename::{is_ota_filename, is_static_segment, ota_target, NameRejection};
pub use grammar::percent_decode;
pub use listing::{format_line, ChangeSet, FileListing};
pub use parser::{parse_request_head, RequestHeadParser, DEFAULT_BUFSIZE, MAX_CONTENT_LENGTH_DIGITS};
pub use request::{QueryParams, RequestHead};
pub use response::{content_type_for, reason_phrase, write_error, write_response, write_response_head};
pub use secret::{SharedSecret, SECRET_LEN};
