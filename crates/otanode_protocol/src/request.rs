//! Parsed request heads.

use crate::grammar::percent_decode;
use std::collections::HashMap;

/// The request line and retained headers of one request.
///
/// Built per connection by [`crate::parse_request_head`] and consumed by the
/// dispatcher; it never outlives the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    /// Request method token, e.g. `GET`.
    pub method: String,
    /// Raw request target (path plus query), still percent-encoded.
    pub uri: Vec<u8>,
    /// Decoded path segments, without the leading empty segment.
    pub path: Vec<Vec<u8>>,
    /// Raw query component (after the first `?`), if present.
    pub query: Option<Vec<u8>>,
    /// HTTP minor version (major is always 1).
    pub minor_version: u8,
    /// Retained headers: lower-cased name to values in arrival order.
    pub headers: HashMap<String, Vec<String>>,
    /// Bytes read past the end of the header block.
    pub leftover: Vec<u8>,
    /// Declared body length, 0 unless a single valid `content-length` was sent.
    pub content_length: u64,
}

impl RequestHead {
    /// Returns the first value of a retained header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns true if the header was sent at least once.
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(&name.to_ascii_lowercase())
    }

    /// Returns the path segments as lossy UTF-8 strings.
    pub fn path_str(&self) -> Vec<String> {
        self.path
            .iter()
            .map(|segment| String::from_utf8_lossy(segment).into_owned())
            .collect()
    }

    /// Parses the query component.
    pub fn query_params(&self) -> QueryParams {
        self.query
            .as_deref()
            .map(QueryParams::parse)
            .unwrap_or_default()
    }
}

/// Decoded `key=value` pairs of a query string, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parses `a=1&b=2`. Keys without `=` get an empty value.
    pub fn parse(query: &[u8]) -> Self {
        let pairs = query
            .split(|&b| b == b'&')
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (key, value) = match part.iter().position(|&b| b == b'=') {
                    Some(pos) => (&part[..pos], &part[pos + 1..]),
                    None => (part, &[][..]),
                };
                (
                    String::from_utf8_lossy(&percent_decode(key)).into_owned(),
                    String::from_utf8_lossy(&percent_decode(value)).into_owned(),
                )
            })
            .collect();
        Self { pairs }
    }

    /// Returns the first value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if there are no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
