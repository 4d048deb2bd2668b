//! Live fetch primitive
//!
//! The cache only needs one thing from the transport: fetch a URL and hand
//! back the status and raw body, or say why it could not. [`Fetcher`] is
//! that seam; [`HttpFetcher`] is the reqwest-backed implementation.

mod http;

pub use http::{FetchConfig, HttpFetcher};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Why a live fetch did not produce usable data
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The request could not complete (DNS, connection, reading the body)
    #[error("network error: {0}")]
    Network(String),

    /// The request did not finish within the allowed time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a non-2xx status
    #[error("HTTP status {0}")]
    HttpStatus(u16),
}

/// Status and body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for any 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetches the raw text of a URL
///
/// Implementations report any completed request as `Ok`, whatever its
/// status; the caller decides what counts as success.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for std::sync::Arc<F> {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        (**self).fetch(url).await
    }
}
