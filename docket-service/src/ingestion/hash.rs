//! Content hashing for duplicate detection.

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of a byte slice, returning a lowercase hex string.
pub fn compute_content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}
