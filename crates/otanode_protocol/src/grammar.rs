//! Character classes and small grammars from RFC 7230 / RFC 3986.

/// Returns true if `byte` is a `tchar`.
fn is_tchar(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&byte)
}

/// Returns true if `bytes` is a non-empty `token`.
pub fn is_token(bytes: &[u8]) -> bool {
    !bytes.is_empty() && bytes.iter().all(|&b| is_tchar(b))
}

/// Returns true if `byte` is an unreserved, sub-delim, `:` or `@` character.
fn is_pchar(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"-._~!$&'()*+,;=:@".contains(&byte)
}

/// Checks that every byte is a pchar, one of `extra`, or part of a
/// well-formed `%XX` escape.
fn all_pchars(bytes: &[u8], extra: &[u8]) -> bool {
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        if byte == b'%' {
            let escape_ok = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !escape_ok {
                return false;
            }
            i += 3;
        } else if is_pchar(byte) || extra.contains(&byte) {
            i += 1;
        } else {
            return false;
        }
    }
    true
}

/// Splits an origin-form target into path and optional query at the first `?`.
pub fn split_target(uri: &[u8]) -> (&[u8], Option<&[u8]>) {
    match uri.iter().position(|&b| b == b'?') {
        Some(pos) => (&uri[..pos], Some(&uri[pos + 1..])),
        None => (uri, None),
    }
}

/// Validates an origin-form request target: `absolute-path [ "?" query ]`.
pub fn is_origin_form(uri: &[u8]) -> bool {
    if uri.first() != Some(&b'/') {
        return false;
    }
    let (path, query) = split_target(uri);
    all_pchars(path, b"/") && query.map_or(true, |q| all_pchars(q, b"/?"))
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Replaces every `%XX` escape with the byte it encodes.
///
/// Malformed escapes are copied through unchanged.
pub fn percent_decode(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

/// Splits an absolute path into percent-decoded segments.
///
/// The empty segment before the leading `/` is dropped, so `/ota/x` yields
/// `["ota", "x"]` and `/` yields `[""]`. Decoding happens after splitting, so
/// an encoded `%2F` stays inside its segment.
pub fn path_segments(path: &[u8]) -> Vec<Vec<u8>> {
    path.split(|&b| b == b'/')
        .skip(1)
        .map(percent_decode)
        .collect()
}

/// Returns true if every byte may appear in a header field value.
pub fn is_field_value(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == b'\t' || (b' '..=b'~').contains(&b))
}

/// Trims leading and trailing spaces and tabs.
pub fn trim_ows(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|&b| b != b' ' && b != b'\t')
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|&b| b != b' ' && b != b'\t')
        .map_or(start, |pos| pos + 1);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens() {
        assert!(is_token(b"GET"));
        assert!(is_token(b"x-random-header"));
        assert!(!is_token(b""));
        assert!(!is_token(b"GE T"));
        assert!(!is_token(b"a,b"));
        assert!(!is_token(b"host:"));
    }

    #[test]
    fn origin_form() {
        assert!(is_origin_form(b"/"));
        assert!(is_origin_form(b"/index.html"));
        assert!(is_origin_form(b"/ota/main.py?sparkle=ab12&noop=yes"));
        assert!(is_origin_form(b"/a%20b//c?x=/y?z"));
        assert!(!is_origin_form(b"index.html"));
        assert!(!is_origin_form(b"/a b"));
        assert!(!is_origin_form(b"/bad%2"));
        assert!(!is_origin_form(b"/bad%zz"));
        assert!(!is_origin_form(b"/q?x=#frag"));
    }

    #[test]
    fn decoding_happens_after_split() {
        assert_eq!(
            path_segments(b"/ota/a%2Fb"),
            vec![b"ota".to_vec(), b"a/b".to_vec()]
        );
        assert_eq!(path_segments(b"/"), vec![Vec::<u8>::new()]);
        assert_eq!(
            path_segments(b"/x%41y/"),
            vec![b"xAy".to_vec(), Vec::new()]
        );
    }

    #[test]
    fn percent_decode_edges() {
        assert_eq!(percent_decode(b"%41%4a%4A"), b"AJJ");
        assert_eq!(percent_decode(b"100%"), b"100%");
        assert_eq!(percent_decode(b"%4"), b"%4");
    }

    #[test]
    fn field_values() {
        assert!(is_field_value(b" text/plain;\tq=1 "));
        assert!(!is_field_value(b"caf\xc3\xa9"));
        assert!(!is_field_value(b"a\x7fb"));
        assert_eq!(trim_ows(b" \t value \t"), b"value");
        assert_eq!(trim_ows(b" \t "), b"");
    }
}
