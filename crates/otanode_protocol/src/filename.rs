//! Filename policy for OTA-managed files and static resources.

/// Returns true if `name` may be read or written over OTA.
///
/// OTA names are non-empty and use only `[0-9A-Za-z_.]`. That excludes
/// separators, so OTA never reaches outside the root directory.
pub fn is_ota_filename(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(is_ota_char) && name != "." && name != ".."
}

fn is_ota_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'.'
}

/// Returns true if `segment` may name a file or directory under the web root.
///
/// Static segments additionally allow `-`, and never resolve to `.` or `..`.
pub fn is_static_segment(segment: &[u8]) -> bool {
    !segment.is_empty()
        && segment != b"."
        && segment != b".."
        && segment
            .iter()
            .all(|&b| is_ota_char(b) || b == b'-')
}

/// Why an OTA path was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRejection {
    /// The name uses characters outside the policy (400).
    InvalidCharacters,
    /// The path has more than one segment below `ota/` (404).
    Nested,
}

/// Validates the segments that follow `ota` in a request path.
///
/// Returns the single filename on success.
pub fn ota_target(segments: &[Vec<u8>]) -> Result<&str, NameRejection> {
    let [segment] = segments else {
        return Err(NameRejection::Nested);
    };
    std::str::from_utf8(segment)
        .ok()
        .filter(|name| is_ota_filename(name))
        .ok_or(NameRejection::InvalidCharacters)
}
