//! Cryptographic digesting of memory regions and file contents.
//!
//! SHA-256 is the only digest in the verification contract. Hashing is pure
//! and deterministic: identical input bytes always yield the identical
//! 32-byte digest, whether the bytes come from the live image or a file.

use sha2::{Digest as _, Sha256};
use std::fmt;

/// A fixed 32-byte SHA-256 digest.
///
/// Rendered as 64 lowercase hex characters for comparison and transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase 64-character hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Case-sensitive comparison against a reference hex string.
    pub fn matches_hex(&self, reference: &str) -> bool {
        self.to_hex() == reference
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Digest(bytes)
    }
}

/// Computes the SHA-256 digest of the given bytes.
///
/// The slice is fed to the hasher in place; no intermediate copy of the
/// input is made, so this is suitable for large mapped code sections.
pub fn sha256(data: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Digest(hasher.finalize().into())
}
