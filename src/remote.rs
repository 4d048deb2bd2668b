//! Fetch-with-fallback reads of remote JSON
//!
//! [`RemoteJson::read_json`] fetches a URL, stores the body in the cache
//! directory on success and returns the parsed document. When the fetch
//! fails for any reason (transport error, timeout, non-2xx status) the last
//! successfully stored body is parsed and returned instead.
//!
//! Concurrent reads of *different* URLs are independent. Concurrent reads of
//! the same URL into the same directory are not isolated from each other: a
//! failing call may read the entry while a succeeding call replaces it. Each
//! read still sees a complete payload, but callers needing one consistent
//! answer per URL must serialise those calls themselves.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{derive_key, CacheError, CacheKey, CacheStore};
use crate::fetch::{FetchError, Fetcher, HttpFetcher};

/// Where a returned document came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A live fetch that just succeeded
    Live,
    /// The cached copy from the last successful fetch
    Cache {
        /// Modification time of the entry, if the filesystem reports one
        stored_at: Option<DateTime<Utc>>,
    },
}

impl Source {
    pub fn is_cache(&self) -> bool {
        matches!(self, Source::Cache { .. })
    }
}

/// Which path produced a payload that failed to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadOrigin {
    Live,
    Cache,
}

impl std::fmt::Display for PayloadOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadOrigin::Live => f.write_str("live response"),
            PayloadOrigin::Cache => f.write_str("cached copy"),
        }
    }
}

/// Errors surfaced to callers of [`RemoteJson::read_json`]
#[derive(Debug, Error)]
pub enum ReadJsonError {
    /// The payload was not valid JSON (or not the requested shape)
    #[error("invalid JSON in {origin} of {url}: {source}")]
    Parse {
        url: String,
        origin: PayloadOrigin,
        #[source]
        source: serde_json::Error,
    },

    /// The fetch failed and nothing was cached for the URL
    #[error("failed to fetch {url} ({cause}) and no cached fallback is available")]
    NoFallback {
        url: String,
        #[source]
        cause: FetchError,
    },

    /// The fetch failed and the cached entry could not be read
    #[error("failed to fetch {url} ({cause}) and the cached fallback could not be read")]
    CacheRead {
        url: String,
        cause: FetchError,
        #[source]
        source: CacheError,
    },
}

impl ReadJsonError {
    /// The fetch failure that led to this error, if there was one
    pub fn fetch_cause(&self) -> Option<&FetchError> {
        match self {
            ReadJsonError::Parse { .. } => None,
            ReadJsonError::NoFallback { cause, .. } | ReadJsonError::CacheRead { cause, .. } => {
                Some(cause)
            }
        }
    }
}

/// A parsed document plus how it was obtained
#[derive(Debug, Clone)]
pub struct Fetched<T = Value> {
    pub value: T,
    pub source: Source,
    /// Set when the value came from the cache: the failure that caused it
    pub fallback_cause: Option<FetchError>,
}

/// Raw payload before parsing
struct Payload {
    bytes: Vec<u8>,
    source: Source,
    fallback_cause: Option<FetchError>,
}

/// Reads remote JSON through a fetcher, falling back to a disk cache
#[derive(Debug, Clone)]
pub struct RemoteJson<F = HttpFetcher> {
    fetcher: F,
    deadline: Option<Duration>,
}

impl RemoteJson<HttpFetcher> {
    /// Creates a reader backed by a default [`HttpFetcher`]
    pub fn new() -> Self {
        Self::with_fetcher(HttpFetcher::new())
    }
}

impl Default for RemoteJson<HttpFetcher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Fetcher> RemoteJson<F> {
    pub fn with_fetcher(fetcher: F) -> Self {
        Self {
            fetcher,
            deadline: None,
        }
    }

    /// Bounds each live fetch; running out of time counts as a failed fetch
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetches `url` as JSON, using `cache_dir` as the fallback store
    ///
    /// # Returns
    /// * `Ok(Value)` from the live response, or from the cache if the fetch failed
    /// * `Err(ReadJsonError::Parse)` if the chosen payload is not valid JSON
    /// * `Err(ReadJsonError::NoFallback)` if the fetch failed and nothing is cached
    /// * `Err(ReadJsonError::CacheRead)` if the fetch failed and the entry is unreadable
    pub async fn read_json(
        &self,
        url: &str,
        cache_dir: impl AsRef<Path>,
    ) -> Result<Value, ReadJsonError> {
        self.read_json_with_source(url, cache_dir)
            .await
            .map(|fetched| fetched.value)
    }

    /// Like [`read_json`](Self::read_json), also reporting which path served the data
    pub async fn read_json_with_source(
        &self,
        url: &str,
        cache_dir: impl AsRef<Path>,
    ) -> Result<Fetched, ReadJsonError> {
        self.read_as(url, cache_dir).await
    }

    /// Fetches `url` and deserializes it into `T`
    ///
    /// The same fallback rules apply; a payload that does not match `T` is a
    /// parse error, whichever path it came from.
    pub async fn read_as<T: DeserializeOwned>(
        &self,
        url: &str,
        cache_dir: impl AsRef<Path>,
    ) -> Result<Fetched<T>, ReadJsonError> {
        let store = CacheStore::new(cache_dir.as_ref());
        let key = derive_key(url);
        let payload = self.load(url, &store, &key).await?;

        let origin = if payload.source.is_cache() {
            PayloadOrigin::Cache
        } else {
            PayloadOrigin::Live
        };
        let value =
            serde_json::from_slice(&payload.bytes).map_err(|source| ReadJsonError::Parse {
                url: url.to_string(),
                origin,
                source,
            })?;

        Ok(Fetched {
            value,
            source: payload.source,
            fallback_cause: payload.fallback_cause,
        })
    }

    /// Reads several URLs concurrently into the same cache directory
    ///
    /// Results are returned in the order of `urls`.
    pub async fn read_json_all<S: AsRef<str>>(
        &self,
        urls: &[S],
        cache_dir: impl AsRef<Path>,
    ) -> Vec<Result<Value, ReadJsonError>> {
        let cache_dir = cache_dir.as_ref();
        join_all(urls.iter().map(|url| self.read_json(url.as_ref(), cache_dir))).await
    }

    /// Obtains the bytes to parse: live if possible, cached otherwise
    async fn load(
        &self,
        url: &str,
        store: &CacheStore,
        key: &CacheKey,
    ) -> Result<Payload, ReadJsonError> {
        let cause = match self.fetch_live(url).await {
            Ok(body) => {
                if let Err(e) = store.write(key, &body).await {
                    warn!(url, error = %e, "could not update cache entry");
                }
                return Ok(Payload {
                    bytes: body,
                    source: Source::Live,
                    fallback_cause: None,
                });
            }
            Err(cause) => cause,
        };

        warn!(url, error = %cause, "fetch failed, trying cached copy");
        match store.read(key).await {
            Ok(bytes) => {
                let stored_at = store.stored_at(key).await;
                info!(url, key = %key, "serving cached copy");
                Ok(Payload {
                    bytes,
                    source: Source::Cache { stored_at },
                    fallback_cause: Some(cause),
                })
            }
            Err(e) if e.is_not_found() => Err(ReadJsonError::NoFallback {
                url: url.to_string(),
                cause,
            }),
            Err(source) => Err(ReadJsonError::CacheRead {
                url: url.to_string(),
                cause,
                source,
            }),
        }
    }

    /// Performs the live fetch, folding timeouts and non-2xx into `FetchError`
    async fn fetch_live(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!(url, "fetching");
        let response = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.fetcher.fetch(url))
                .await
                .map_err(|_| FetchError::Timeout(deadline))??,
            None => self.fetcher.fetch(url).await?,
        };

        if !response.is_success() {
            return Err(FetchError::HttpStatus(response.status));
        }
        Ok(response.body)
    }
}

/// Fetches `url` as JSON with a default HTTP client, falling back to `cache_dir`
///
/// `cache_dir` must already exist; the cache never creates it.
pub async fn read_json(url: &str, cache_dir: impl AsRef<Path>) -> Result<Value, ReadJsonError> {
    RemoteJson::new().read_json(url, cache_dir).await
}
