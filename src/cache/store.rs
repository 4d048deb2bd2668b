//! On-disk cache store
//!
//! Holds one file per cache key inside a caller-supplied directory. Writes go
//! through a temporary sibling file that is renamed over the entry, so a
//! concurrent reader sees either the previous payload or the new one.
//!
//! The write itself runs on the blocking pool and is not tied to the caller's
//! future: once started it either renames the temporary file into place or
//! deletes it, even if the caller stops waiting.

use chrono::{DateTime, Utc};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::Builder;
use thiserror::Error;
use tokio::fs;
use tokio::task;

use super::CacheKey;

/// Errors from reading or writing cache entries
#[derive(Debug, Error)]
pub enum CacheError {
    /// No entry exists for the key
    #[error("no cache entry at {}", path.display())]
    NotFound { path: PathBuf },

    /// The entry (or its directory) could not be read or written
    #[error("cache I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound { .. })
    }
}

/// Handle to a cache directory
///
/// The directory is a namespace: the same key in two stores names two
/// independent entries. The store never creates the directory itself.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of the entry for `key` (`<dir>/<key>`)
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.as_str())
    }

    /// Returns true if an entry for `key` is present and can be opened
    pub async fn exists(&self, key: &CacheKey) -> bool {
        let path = self.entry_path(key);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => fs::File::open(&path).await.is_ok(),
            _ => false,
        }
    }

    /// Reads the stored bytes for `key`
    ///
    /// # Returns
    /// * `Ok(bytes)` with the full entry
    /// * `Err(CacheError::NotFound)` if there is no entry
    /// * `Err(CacheError::Io)` if the entry exists but cannot be read
    pub async fn read(&self, key: &CacheKey) -> Result<Vec<u8>, CacheError> {
        let path = self.entry_path(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CacheError::NotFound { path }),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    /// Replaces the entry for `key` with `bytes`
    ///
    /// The bytes are written and synced to a hidden temporary file in the
    /// same directory, which is then renamed over the entry. If anything
    /// fails, or the write is abandoned, the temporary file is removed and
    /// the previous entry is left as it was. Fails with `CacheError::Io` if
    /// the directory is missing.
    pub async fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        let prefix = format!(".{}.", key);
        let (dir, target, bytes) = (self.dir.clone(), path.clone(), bytes.to_vec());

        let result =
            task::spawn_blocking(move || write_then_rename(&dir, &prefix, &target, &bytes))
                .await
                .unwrap_or_else(|e| Err(io::Error::new(io::ErrorKind::Other, e)));

        result.map_err(|source| CacheError::Io { path, source })
    }

    /// Returns when the entry for `key` was last written, if known
    pub async fn stored_at(&self, key: &CacheKey) -> Option<DateTime<Utc>> {
        let meta = fs::metadata(self.entry_path(key)).await.ok()?;
        meta.modified().ok().map(DateTime::<Utc>::from)
    }
}

/// Blocking half of [`CacheStore::write`]
///
/// The temporary file deletes itself when dropped, so every early return
/// (and a panic) cleans up; only a successful `persist` keeps it.
fn write_then_rename(dir: &Path, prefix: &str, target: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp = Builder::new().prefix(prefix).suffix(".tmp").tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}
