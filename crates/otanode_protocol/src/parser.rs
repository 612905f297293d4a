//! Incremental HTTP/1.1 request head parser.
//!
//! The parser never buffers more than `bufsize` bytes. That bound is also
//! the hard limit on the request line and on each header line, so a device
//! with very little memory can serve requests straight off a socket that
//! hands out data in small, arbitrary chunks.
//!
//! Parsing is independent of how the peer's bytes are chunked: the parser
//! keeps reading until a line terminator is buffered, the buffer is full, or
//! the peer closes. Only the split between [`RequestHead::leftover`] and the
//! bytes still unread on the stream depends on chunking.

use crate::error::{HttpError, ProtocolResult};
use crate::grammar::{is_field_value, is_origin_form, is_token, path_segments, split_target, trim_ows};
use crate::request::RequestHead;
use std::collections::{HashMap, HashSet};
use std::io::{ErrorKind, Read};
use tracing::debug;

/// Default buffer bound in bytes.
pub const DEFAULT_BUFSIZE: usize = 10_000;

/// Longest accepted `content-length` value, in decimal digits.
pub const MAX_CONTENT_LENGTH_DIGITS: usize = 9;

const CONTENT_LENGTH: &str = "content-length";
const TRANSFER_ENCODING: &str = "transfer-encoding";

/// Outcome of trying to buffer one complete line.
enum Fill {
    /// A CRLF starts at this offset.
    Line(usize),
    /// `bufsize` bytes are buffered and none of them ends the line.
    Full,
    /// The peer closed before the line was complete.
    Eof,
}

/// Parses request heads from a byte stream under a fixed memory bound.
///
/// # Example
///
/// ```
/// use otanode_protocol::RequestHeadParser;
///
/// let mut stream: &[u8] = b"GET /ota-listing HTTP/1.1\r\nHost: node\r\n\r\n";
/// let head = RequestHeadParser::new(64)
///     .with_headers(["host"])
///     .parse(&mut stream)
///     .unwrap();
/// assert_eq!(head.method, "GET");
/// assert_eq!(head.header("host"), Some("node"));
/// ```
#[derive(Debug, Clone)]
pub struct RequestHeadParser {
    bufsize: usize,
    interesting: HashSet<String>,
}

impl RequestHeadParser {
    /// Creates a parser that reads at most `bufsize` bytes at a time.
    ///
    /// `content-length` and `transfer-encoding` are always retained.
    pub fn new(bufsize: usize) -> Self {
        let interesting = [CONTENT_LENGTH, TRANSFER_ENCODING]
            .into_iter()
            .map(String::from)
            .collect();
        Self {
            bufsize: bufsize.max(1),
            interesting,
        }
    }

    /// Adds header names (matched case-insensitively) to retain.
    pub fn with_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.interesting
            .extend(names.into_iter().map(|n| n.as_ref().to_ascii_lowercase()));
        self
    }

    /// Returns the buffer bound.
    pub fn bufsize(&self) -> usize {
        self.bufsize
    }

    /// Reads and parses one request head.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ProtocolError::Http`] with the status to send back
    /// when the head is malformed or too large, and
    /// [`crate::ProtocolError::Io`] when the stream fails.
    pub fn parse<R: Read>(&self, reader: &mut R) -> ProtocolResult<RequestHead> {
        let mut buf = Vec::with_capacity(self.bufsize);

        let line_end = match self.fill_line(reader, &mut buf)? {
            Fill::Line(pos) => pos,
            Fill::Full => return Err(diagnose_unterminated(&buf).into()),
            Fill::Eof => {
                return Err(HttpError::bad_request("connection closed before end of request line").into())
            }
        };

        let mut head = parse_request_line(&buf[..line_end])?;
        debug!(method = %head.method, uri = %String::from_utf8_lossy(&head.uri), "request line");
        buf.drain(..line_end + 2);

        let mut headers: HashMap<String, Vec<String>> = HashMap::new();
        loop {
            let line_end = match self.fill_line(reader, &mut buf)? {
                Fill::Line(pos) => pos,
                Fill::Full => return Err(HttpError::new(431, "header too long").into()),
                Fill::Eof => {
                    return Err(
                        HttpError::bad_request("connection closed before end of headers").into(),
                    )
                }
            };

            if line_end == 0 {
                buf.drain(..2);
                break;
            }

            let (name, value) = parse_header_line(&buf[..line_end])?;
            if self.interesting.contains(&name) {
                headers.entry(name).or_default().push(value);
            }
            buf.drain(..line_end + 2);
        }

        head.content_length = body_length(&headers)?;
        head.headers = headers;
        head.leftover = buf;
        Ok(head)
    }

    /// Reads until `buf` holds a CRLF, holds `bufsize` bytes, or the peer closes.
    fn fill_line<R: Read>(&self, reader: &mut R, buf: &mut Vec<u8>) -> ProtocolResult<Fill> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = find_crlf(buf, scanned) {
                return Ok(Fill::Line(pos));
            }
            // A CR at the very end may still be followed by LF.
            scanned = buf.len().saturating_sub(1);

            if buf.len() >= self.bufsize {
                return Ok(Fill::Full);
            }

            let start = buf.len();
            buf.resize(self.bufsize, 0);
            let read = match reader.read(&mut buf[start..]) {
                Ok(n) => n,
                Err(e) => {
                    buf.truncate(start);
                    if e.kind() == ErrorKind::Interrupted {
                        continue;
                    }
                    return Err(e.into());
                }
            };
            buf.truncate(start + read);

            if read == 0 {
                return Ok(Fill::Eof);
            }
        }
    }
}

impl Default for RequestHeadParser {
    fn default() -> Self {
        Self::new(DEFAULT_BUFSIZE)
    }
}

/// Parses one request head with the given bound and extra headers to keep.
pub fn parse_request_head<R: Read>(
    reader: &mut R,
    bufsize: usize,
    interesting_headers: &[&str],
) -> ProtocolResult<RequestHead> {
    RequestHeadParser::new(bufsize)
        .with_headers(interesting_headers)
        .parse(reader)
}

fn find_crlf(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|pos| pos + from)
}

/// Blames an unterminated request line on the field that most likely
/// overflowed, judged by how many separating spaces arrived.
fn diagnose_unterminated(buf: &[u8]) -> HttpError {
    match buf.iter().filter(|&&b| b == b' ').count() {
        0 => HttpError::new(501, "method too long"),
        1 => HttpError::new(414, "uri too long"),
        // The version has a fixed length, so the uri takes the blame.
        2 => HttpError::new(414, "uri too long"),
        _ => HttpError::bad_request("too many spaces in request line"),
    }
}

fn parse_request_line(line: &[u8]) -> Result<RequestHead, HttpError> {
    let parts: Vec<&[u8]> = line.split(|&b| b == b' ').collect();
    let [method, uri, version] = parts.as_slice() else {
        return Err(HttpError::bad_request("wrong number of spaces in request line"));
    };

    if !is_token(method) {
        return Err(HttpError::bad_request("invalid request method format"));
    }
    if !is_origin_form(uri) {
        return Err(HttpError::bad_request("invalid request uri format"));
    }
    let (major, minor) = parse_http_version(version)
        .ok_or_else(|| HttpError::bad_request("invalid http version string"))?;
    if major != 1 {
        return Err(HttpError::new(505, "http version not supported"));
    }

    let (path, query) = split_target(uri);
    Ok(RequestHead {
        method: String::from_utf8_lossy(method).into_owned(),
        uri: uri.to_vec(),
        path: path_segments(path),
        query: query.map(<[u8]>::to_vec),
        minor_version: minor,
        headers: HashMap::new(),
        leftover: Vec::new(),
        content_length: 0,
    })
}

fn parse_http_version(version: &[u8]) -> Option<(u8, u8)> {
    match version {
        [b'H', b'T', b'T', b'P', b'/', major, b'.', minor]
            if major.is_ascii_digit() && minor.is_ascii_digit() =>
        {
            Some((major - b'0', minor - b'0'))
        }
        _ => None,
    }
}

/// Splits a header line at its first colon and validates both halves.
///
/// Only the first colon separates; the value may contain more, as in `host: 10.0.0.7:5000`.
fn parse_header_line(line: &[u8]) -> Result<(String, String), HttpError> {
    let colon = line
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| HttpError::bad_request("invalid header format"))?;
    let (name, value) = (&line[..colon], &line[colon + 1..]);

    if !is_token(name) || !is_field_value(value) {
        return Err(HttpError::bad_request("invalid header format"));
    }
    let value = trim_ows(value);
    if value.is_empty() {
        return Err(HttpError::bad_request("invalid header format"));
    }

    Ok((
        String::from_utf8_lossy(name).to_ascii_lowercase(),
        String::from_utf8_lossy(value).into_owned(),
    ))
}

/// Determines the body length from the framing headers (RFC 7230 §3.3.3).
fn body_length(headers: &HashMap<String, Vec<String>>) -> Result<u64, HttpError> {
    if headers.contains_key(TRANSFER_ENCODING) {
        return Err(HttpError::new(500, "transfer-encoding is not supported"));
    }

    let Some(values) = headers.get(CONTENT_LENGTH) else {
        return Ok(0);
    };
    let [value] = values.as_slice() else {
        return Err(HttpError::bad_request(
            "content-length header is defined more than once",
        ));
    };
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(HttpError::bad_request("content-length header has invalid format"));
    }
    if value.len() > MAX_CONTENT_LENGTH_DIGITS {
        return Err(HttpError::new(413, "request payload is too large"));
    }
    value
        .parse()
        .map_err(|_| HttpError::bad_request("content-length header has invalid format"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use proptest::prelude::*;

    const SIMPLE_GET: &[u8] =
        b"GET /index.html HTTP/1.1\r\nHost: example.com\r\nUser-Agent: test\r\nAccept: */*\r\n\r\n";

    fn large_header_get() -> Vec<u8> {
        let mut request = SIMPLE_GET[..SIMPLE_GET.len() - 2].to_vec();
        request.extend_from_slice(
            b"x-random-header: this is just a very very large header to test some features\r\n\r\n",
        );
        request
    }

    /// Hands out the data in reads no larger than the given chunk sizes,
    /// cycling through them.
    struct ChunkedReader {
        data: Vec<u8>,
        pos: usize,
        chunks: Vec<usize>,
        turn: usize,
    }

    impl ChunkedReader {
        fn new(data: &[u8], chunks: &[usize]) -> Self {
            Self {
                data: data.to_vec(),
                pos: 0,
                chunks: chunks.iter().map(|&c| c.max(1)).collect(),
                turn: 0,
            }
        }

        fn whole(data: &[u8]) -> Self {
            Self::new(data, &[usize::MAX])
        }

        fn rest(&self) -> &[u8] {
            &self.data[self.pos..]
        }
    }

    impl Read for ChunkedReader {
        fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
            let limit = self.chunks[self.turn % self.chunks.len()];
            self.turn += 1;
            let n = out.len().min(limit).min(self.data.len() - self.pos);
            out[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    fn status_of(result: ProtocolResult<RequestHead>) -> u16 {
        match result {
            Err(ProtocolError::Http(e)) => e.status,
            other => panic!("expected an http error, got {other:?}"),
        }
    }

    #[test]
    fn simple_get() {
        let head = parse_request_head(&mut ChunkedReader::whole(SIMPLE_GET), 10_000, &[]).unwrap();
        assert_eq!(head.method, "GET");
        assert_eq!(head.uri, b"/index.html");
        assert_eq!(head.path, vec![b"index.html".to_vec()]);
        assert_eq!(head.minor_version, 1);
        assert!(head.leftover.is_empty());
        assert_eq!(head.content_length, 0);
        assert!(head.headers.is_empty());
    }

    #[test]
    fn small_buffers_get() {
        let head = parse_request_head(&mut ChunkedReader::whole(SIMPLE_GET), 30, &[]).unwrap();
        assert_eq!(head.method, "GET");
        assert_eq!(head.uri, b"/index.html");
        assert!(head.leftover.is_empty());
        assert_eq!(head.content_length, 0);
    }

    #[test]
    fn uri_too_long() {
        let result = parse_request_head(&mut ChunkedReader::whole(SIMPLE_GET), 20, &[]);
        assert_eq!(status_of(result), 414);
    }

    #[test]
    fn header_too_long() {
        let result = parse_request_head(&mut ChunkedReader::whole(&large_header_get()), 30, &[]);
        assert_eq!(status_of(result), 431);
    }

    #[test]
    fn retains_interesting_headers_case_insensitively() {
        let head = parse_request_head(
            &mut ChunkedReader::whole(SIMPLE_GET),
            30,
            &["ACCEPT", "Host"],
        )
        .unwrap();
        assert_eq!(head.headers["host"], vec!["example.com"]);
        assert_eq!(head.headers["accept"], vec!["*/*"]);
        assert!(!head.headers.contains_key("user-agent"));
    }

    #[test]
    fn large_header_fits_larger_buffer() {
        let head = parse_request_head(
            &mut ChunkedReader::whole(&large_header_get()),
            100,
            &["ACCEPT", "Host", "x-random-header"],
        )
        .unwrap();
        assert_eq!(head.headers["host"], vec!["example.com"]);
        assert_eq!(
            head.headers["x-random-header"],
            vec!["this is just a very very large header to test some features"]
        );
    }

    #[test]
    fn unterminated_request_line_diagnosis() {
        // Exactly N bytes with no terminator.
        let method = b"GETGETGETGETGETGETGE";
        let result = parse_request_head(&mut ChunkedReader::whole(method), 20, &[]);
        assert_eq!(status_of(result), 501);

        let uri = b"GET /aaaaaaaaaaaaaaa";
        let result = parse_request_head(&mut ChunkedReader::whole(uri), 20, &[]);
        assert_eq!(status_of(result), 414);

        let version = b"GET /aaaaaaaaa HTTP/";
        let result = parse_request_head(&mut ChunkedReader::whole(version), 20, &[]);
        assert_eq!(status_of(result), 414);

        let spaces = b"GET / a b c d e f g ";
        let result = parse_request_head(&mut ChunkedReader::whole(spaces), 20, &[]);
        assert_eq!(status_of(result), 400);
    }

    #[test]
    fn request_line_validation() {
        let cases: &[(&[u8], u16)] = &[
            (b"GET  /x HTTP/1.1\r\n\r\n", 400),
            (b"GET /x HTTP/1.1 extra\r\n\r\n", 400),
            (b"G(T /x HTTP/1.1\r\n\r\n", 400),
            (b"GET x HTTP/1.1\r\n\r\n", 400),
            (b"GET /a%zz HTTP/1.1\r\n\r\n", 400),
            (b"GET /x HTTP/1x1\r\n\r\n", 400),
            (b"GET /x HTTP/11\r\n\r\n", 400),
            (b"GET /x HTTP/2.0\r\n\r\n", 505),
            (b"GET /x HTTP/0.9\r\n\r\n", 505),
        ];
        for (request, status) in cases {
            let result = parse_request_head(&mut ChunkedReader::whole(request), 100, &[]);
            assert_eq!(status_of(result), *status, "{}", String::from_utf8_lossy(request));
        }
    }

    #[test]
    fn minor_version_is_ignored() {
        let head = parse_request_head(
            &mut ChunkedReader::whole(b"GET / HTTP/1.0\r\n\r\n"),
            100,
            &[],
        )
        .unwrap();
        assert_eq!(head.minor_version, 0);
        assert_eq!(head.path, vec![Vec::<u8>::new()]);
    }

    #[test]
    fn header_validation() {
        let cases: &[&[u8]] = &[
            b"GET / HTTP/1.1\r\nno colon here\r\n\r\n",
            b"GET / HTTP/1.1\r\nbad name: x\r\n\r\n",
            b"GET / HTTP/1.1\r\n: x\r\n\r\n",
            b"GET / HTTP/1.1\r\nempty: \t \r\n\r\n",
            b"GET / HTTP/1.1\r\nbin: caf\xc3\xa9\r\n\r\n",
        ];
        for request in cases {
            let result = parse_request_head(&mut ChunkedReader::whole(request), 100, &[]);
            assert_eq!(status_of(result), 400, "{}", String::from_utf8_lossy(request));
        }
    }

    #[test]
    fn header_value_may_contain_colons() {
        let head = parse_request_head(
            &mut ChunkedReader::whole(b"GET / HTTP/1.1\r\nHost: 10.0.0.7:5000\r\n\r\n"),
            100,
            &["host"],
        )
        .unwrap();
        assert_eq!(head.header("Host"), Some("10.0.0.7:5000"));
    }

    #[test]
    fn repeated_headers_keep_arrival_order() {
        let head = parse_request_head(
            &mut ChunkedReader::whole(b"GET / HTTP/1.1\r\nX-A: 1\r\nx-a: 2\r\nX-a:3\r\n\r\n"),
            100,
            &["x-a"],
        )
        .unwrap();
        assert_eq!(head.headers["x-a"], vec!["1", "2", "3"]);
    }

    #[test]
    fn content_length_rules() {
        let head = parse_request_head(
            &mut ChunkedReader::whole(b"PUT /ota/a HTTP/1.1\r\ncontent-length: 5\r\n\r\nhello"),
            100,
            &[],
        )
        .unwrap();
        assert_eq!(head.content_length, 5);
        assert_eq!(head.leftover, b"hello");

        let cases: &[(&[u8], u16)] = &[
            (b"PUT / HTTP/1.1\r\nContent-Length: 5\r\ncontent-length: 5\r\n\r\n", 400),
            (b"PUT / HTTP/1.1\r\ncontent-length: 5a\r\n\r\n", 400),
            (b"PUT / HTTP/1.1\r\ncontent-length: -5\r\n\r\n", 400),
            (b"PUT / HTTP/1.1\r\ncontent-length: 1234567890\r\n\r\n", 413),
            (b"PUT / HTTP/1.1\r\ntransfer-encoding: chunked\r\n\r\n", 500),
            (
                b"PUT / HTTP/1.1\r\ncontent-length: 5\r\nTransfer-Encoding: identity\r\n\r\n",
                500,
            ),
        ];
        for (request, status) in cases {
            let result = parse_request_head(&mut ChunkedReader::whole(request), 100, &[]);
            assert_eq!(status_of(result), *status, "{}", String::from_utf8_lossy(request));
        }

        let head = parse_request_head(
            &mut ChunkedReader::whole(b"PUT / HTTP/1.1\r\ncontent-length: 999999999\r\n\r\n"),
            100,
            &[],
        )
        .unwrap();
        assert_eq!(head.content_length, 999_999_999);
    }

    #[test]
    fn truncated_streams() {
        let result = parse_request_head(&mut ChunkedReader::whole(b""), 100, &[]);
        assert_eq!(status_of(result), 400);

        let result = parse_request_head(&mut ChunkedReader::whole(b"GET / HT"), 100, &[]);
        assert_eq!(status_of(result), 400);

        let result =
            parse_request_head(&mut ChunkedReader::whole(b"GET / HTTP/1.1\r\nHost: x\r\n"), 100, &[]);
        assert_eq!(status_of(result), 400);
    }

    #[test]
    fn query_and_decoded_segments() {
        let head = parse_request_head(
            &mut ChunkedReader::whole(b"DELETE /ota/a%2Eb?sparkle=00&noop=yes HTTP/1.1\r\n\r\n"),
            100,
            &[],
        )
        .unwrap();
        assert_eq!(head.method, "DELETE");
        assert_eq!(head.path, vec![b"ota".to_vec(), b"a.b".to_vec()]);
        assert_eq!(head.query.as_deref(), Some(&b"sparkle=00&noop=yes"[..]));
        assert_eq!(head.query_params().get("noop"), Some("yes"));
    }

    #[test]
    fn crlf_split_across_reads() {
        let mut reader = ChunkedReader::new(SIMPLE_GET, &[25, 1, 1, 3]);
        let head = parse_request_head(&mut reader, 30, &["accept"]).unwrap();
        assert_eq!(head.header("accept"), Some("*/*"));
    }

    #[test]
    fn leftover_plus_rest_is_the_body() {
        let mut request = b"PUT /ota/x HTTP/1.1\r\ncontent-length: 11\r\n\r\n".to_vec();
        request.extend_from_slice(b"hello world");
        let mut reader = ChunkedReader::new(&request, &[7]);
        let head = parse_request_head(&mut reader, 64, &[]).unwrap();

        let mut body = head.leftover.clone();
        body.extend_from_slice(reader.rest());
        assert_eq!(body, b"hello world");
    }

    fn request_strategy() -> impl Strategy<Value = Vec<u8>> {
        let segment = "[a-zA-Z0-9_.~-]{0,12}";
        let header = ("[a-zA-Z][a-zA-Z0-9-]{0,10}", "[ -~]{1,20}");
        (
            prop::sample::select(vec!["GET", "PUT", "DELETE", "PATCH"]),
            prop::collection::vec(segment, 1..4),
            prop::option::of("[a-z]{1,5}=[a-z0-9]{0,8}"),
            prop::collection::vec(header, 0..5),
            prop::collection::vec(any::<u8>(), 0..40),
        )
            .prop_map(|(method, segments, query, headers, body)| {
                let mut request = format!("{method} /{}", segments.join("/"));
                if let Some(query) = query {
                    request.push('?');
                    request.push_str(&query);
                }
                request.push_str(" HTTP/1.1\r\n");
                for (name, value) in headers {
                    request.push_str(&format!("{name}: {value}\r\n"));
                }
                request.push_str(&format!("content-length: {}\r\n\r\n", body.len()));
                let mut bytes = request.into_bytes();
                bytes.extend_from_slice(&body);
                bytes
            })
    }

    /// Everything except where the body prefix ends.
    fn comparable(
        result: ProtocolResult<RequestHead>,
        rest: &[u8],
    ) -> Result<(RequestHead, Vec<u8>), u16> {
        result
            .map(|mut head| {
                let mut body = std::mem::take(&mut head.leftover);
                body.extend_from_slice(rest);
                (head, body)
            })
            .map_err(|e| e.status())
    }

    proptest! {
        #[test]
        fn chunk_boundary_independence(
            request in request_strategy(),
            chunks in prop::collection::vec(1usize..48, 1..6),
            bufsize in prop::sample::select(vec![24usize, 48, 64, 256]),
        ) {
            let interesting = ["host", "x-a", "accept"];

            let mut whole = ChunkedReader::whole(&request);
            let expected = parse_request_head(&mut whole, bufsize, &interesting);
            let expected = comparable(expected, whole.rest());

            let mut chunked = ChunkedReader::new(&request, &chunks);
            let actual = parse_request_head(&mut chunked, bufsize, &interesting);
            let actual = comparable(actual, chunked.rest());

            prop_assert_eq!(expected, actual);
        }
    }
}
