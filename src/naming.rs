//! Content-derived link names.

use base64::Engine;
use ring::digest;

/// Number of encoded hash characters a link name starts out with.
pub const SHORT_NAME_LEN: usize = 11;

/// Derive the link name for a piece of page state.
///
/// The name is a prefix of the URL-safe base64 encoding of the SHA-256 digest
/// of the content, so identical content always maps to the identical name.
/// Sites that linkify URLs often drop a trailing underscore, so the prefix is
/// extended until it no longer ends in one.
pub fn short_name(content: &[u8]) -> String {
    let sum = digest::digest(&digest::SHA256, content);
    let encoded = base64::engine::general_purpose::URL_SAFE.encode(sum.as_ref());
    let bytes = encoded.as_bytes();

    let mut len = SHORT_NAME_LEN;
    while len < bytes.len() && bytes[len - 1] == b'_' {
        len += 1;
    }

    encoded[..len].to_string()
}
