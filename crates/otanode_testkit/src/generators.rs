//! Property-based test generators using proptest.
//!
//! Provides strategies for generating names, contents and requests that
//! satisfy the OTA invariants, plus ways of splitting a byte stream.

use proptest::prelude::*;

/// Strategy for names accepted by the OTA filename policy.
pub fn ota_filename_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[0-9A-Za-z_][0-9A-Za-z_.]{0,23}")
        .expect("Invalid regex")
        .prop_filter("dot names are never valid", |s| s != "." && s != "..")
}

/// Strategy for file contents, text and binary alike.
pub fn content_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..2048)
}

/// Strategy for read sizes used to split a stream.
pub fn chunk_size_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![1usize..8, 8usize..64, 64usize..4096]
}

/// Names a device reserves for itself under the default configuration.
pub const RESERVED_NAMES: [&str; 3] = ["ota_secret", "node.json", "config.json"];

/// Strategy for a set of distinct deployable files.
pub fn file_set_strategy() -> impl Strategy<Value = Vec<(String, Vec<u8>)>> {
    let name = ota_filename_strategy()
        .prop_filter("reserved", |name| !RESERVED_NAMES.contains(&name.as_str()));
    prop::collection::btree_map(name, content_strategy(), 0..6)
        .prop_map(|files| files.into_iter().collect())
}
