//! Core traits and types for the resource cache.

use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::http::{Request, Response};

/// Failure of a single network attempt. Attempts are one-shot, never retried.
#[derive(Error, Debug)]
pub enum FetchError {
  #[error("Network error: {0}")]
  Network(#[from] reqwest::Error),

  #[error("Network unavailable: {0}")]
  Offline(String),
}

/// Network access for the cache controller.
///
/// Implementors perform exactly one attempt per call. A response with a
/// non-2xx status is still a successful fetch; only transport failures are
/// errors.
pub trait Fetcher: Send + Sync + 'static {
  fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response, FetchError>> + Send;
}

/// A response replayed from cache storage.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  pub response: Response,
  /// SHA-256 of the body, hex encoded
  pub digest: String,
  /// When the entry was written
  pub cached_at: DateTime<Utc>,
}

/// Indicates where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Replayed from a cache partition
  Cache,
  /// Synthesized because neither cache nor network could supply it
  Placeholder,
}
