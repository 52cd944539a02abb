//! Hashing primitives for request signatures
//!
//! Provides [`ContentHash`], a strongly-typed 32-byte Blake3 digest used to
//! key claims on identical (URL, chain) requests.

use std::fmt::{self, Display, Formatter};

/// A 32-byte content hash (Blake3)
///
/// Immutable and cheap to clone (Copy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Create a new `ContentHash` from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get reference to the underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Compute Blake3 hash of arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self::new(*blake3::hash(data).as_bytes())
    }

    /// Hash an ordered list of parts joined by `separator`.
    ///
    /// `["a", "b"]` with `"|"` hashes the same bytes as `"a|b"`.
    #[must_use]
    pub fn compute_joined<S: AsRef<str>>(parts: &[S], separator: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                hasher.update(separator.as_bytes());
            }
            hasher.update(part.as_ref().as_bytes());
        }
        Self::new(*hasher.finalize().as_bytes())
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
