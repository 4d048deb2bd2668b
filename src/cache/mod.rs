//! Disk cache for fetched payloads
//!
//! Entries are keyed by a SHA-256 digest of the resource URL and stored as
//! one plain file per key inside a caller-supplied directory. There is no
//! expiry: an entry lives until it is overwritten by the next successful
//! fetch or removed by something outside the cache.

mod key;
mod store;

pub use key::{derive_key, CacheKey, KEY_LEN};
pub use store::{CacheError, CacheStore};
