//! Content fingerprinting.
//!
//! A fingerprint is the lowercase-hex SHA-256 of a byte string. It names
//! stored files and keys the record store, so two ingests of bytes that
//! render identically collapse onto one record. It is a duplicate-detection
//! fingerprint, not a signature — there is no key material involved.

use sha2::{Digest, Sha256};

/// Number of hex characters in a full fingerprint.
pub const FINGERPRINT_LEN: usize = 64;

/// Number of leading hex characters used in stored file names.
pub const FILE_PREFIX_LEN: usize = 12;

/// Compute the fingerprint of `bytes`: lowercase hex SHA-256, 64 chars.
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// True if `s` has the shape of a full fingerprint.
#[must_use]
pub fn is_fingerprint(s: &str) -> bool {
    s.len() == FINGERPRINT_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
