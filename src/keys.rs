//! Lookup Keys - Prompt Normalization and Digests
//!
//! A key must not depend on casing or surrounding whitespace, and must be
//! safe to use as a file name once digested.

use sha2::{Digest, Sha256};

/// Trim + case-fold. The result is only ever used for lookup and matching;
/// callers keep the raw prompt for display and remote submission.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// File name for a cache entry stored on disk.
pub fn entry_file_name(key: &str) -> String {
    format!("{}.json", sha256_hex(key.as_bytes()))
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}
