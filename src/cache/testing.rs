//! Test doubles for the cache controller.

use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

use super::http::{Request, Response};
use super::storage::CacheStorage;
use super::traits::{CachedResponse, FetchError, Fetcher};

/// Canned network that counts requests per URL.
#[derive(Clone, Default)]
pub struct StubFetcher {
  routes: Arc<Mutex<HashMap<String, Response>>>,
  calls: Arc<Mutex<HashMap<String, usize>>>,
  offline: Arc<AtomicBool>,
}

impl StubFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn serve(&self, url: &Url, response: Response) {
    self
      .routes
      .lock()
      .unwrap()
      .insert(url.to_string(), response);
  }

  pub fn go_offline(&self) {
    self.offline.store(true, Ordering::SeqCst);
  }

  pub fn calls(&self, url: &Url) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .get(url.as_str())
      .copied()
      .unwrap_or(0)
  }

  pub fn total_calls(&self) -> usize {
    self.calls.lock().unwrap().values().sum()
  }
}

impl Fetcher for StubFetcher {
  async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
    let key = request.cache_key();
    *self.calls.lock().unwrap().entry(key.clone()).or_default() += 1;

    if self.offline.load(Ordering::SeqCst) {
      return Err(FetchError::Offline(key));
    }
    Ok(
      self
        .routes
        .lock()
        .unwrap()
        .get(&key)
        .cloned()
        .unwrap_or_else(|| Response::new(404, Some("text/plain"), "not found")),
    )
  }
}

/// Storage whose writes always fail; reads and deletes pass through.
pub struct FailingWrites<S> {
  inner: S,
}

impl<S> FailingWrites<S> {
  pub fn new(inner: S) -> Self {
    Self { inner }
  }
}

impl<S: CacheStorage> CacheStorage for FailingWrites<S> {
  fn keys(&self) -> Result<Vec<String>> {
    self.inner.keys()
  }

  fn delete(&self, name: &str) -> Result<bool> {
    self.inner.delete(name)
  }

  fn match_in(&self, name: &str, key: &str) -> Result<Option<CachedResponse>> {
    self.inner.match_in(name, key)
  }

  fn put(&self, name: &str, _key: &str, _response: &Response) -> Result<()> {
    Err(eyre!("Quota exceeded writing to {}", name))
  }

  fn put_all(&self, name: &str, _entries: &[(String, Response)]) -> Result<()> {
    Err(eyre!("Quota exceeded writing to {}", name))
  }

  fn entries(&self, name: &str) -> Result<Vec<String>> {
    self.inner.entries(name)
  }
}
