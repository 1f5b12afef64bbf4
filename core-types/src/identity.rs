//! Content addressing. Identities are SHA-256 digests rendered as unpadded URL-safe base64,
//! so they can be used as path segments and URL components without escaping.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::io::{self, Read};

/// Length of an encoded identity (32 digest bytes, unpadded base64).
pub const IDENTITY_LEN: usize = 43;

/// Hashes everything `reader` yields until EOF.
pub fn content_id<R: Read + ?Sized>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(reader, &mut hasher)?;
    Ok(encode(hasher.finalize().as_slice()))
}

pub fn content_id_of(bytes: &[u8]) -> String {
    encode(Sha256::digest(bytes).as_slice())
}

/// Deterministic id of a tag label bound to an image.
pub fn tag_id(image_id: &str, name: &str, value: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image_id.as_bytes());
    hasher.update(name.as_bytes());
    hasher.update(value.unwrap_or_default().as_bytes());
    encode(hasher.finalize().as_slice())
}

/// True when `raw` could have been produced by [`content_id`]. Used to reject path
/// traversal before an identity reaches the filesystem.
pub fn is_valid_identity(raw: &str) -> bool {
    raw.len() == IDENTITY_LEN
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn encode(digest: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(digest)
}
