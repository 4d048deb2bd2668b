//! Cache key derivation
//!
//! Maps a URL to the file name its cache entry lives under.

use sha2::{Digest, Sha256};
use std::fmt;

/// Length in characters of every derived key (hex-encoded SHA-256)
pub const KEY_LEN: usize = 64;

/// Filesystem-safe identifier for one cached resource
///
/// Always exactly [`KEY_LEN`] lowercase hex characters, so it is usable as a
/// single path segment on any platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for a URL. See [`derive_key`].
    pub fn from_url(url: &str) -> Self {
        derive_key(url)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derives the cache key for a URL
///
/// The URL is hashed verbatim with SHA-256; no normalisation is applied, so
/// URLs differing only by a trailing slash or query order get distinct keys.
/// Any string is valid input, including the empty string.
pub fn derive_key(url: &str) -> CacheKey {
    CacheKey(format!("{:x}", Sha256::digest(url.as_bytes())))
}
