//! Resource cache controller: routes intercepted requests between cache
//! partitions and the network, and drives the install/activate lifecycle.

use futures::future::try_join_all;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use super::http::{Destination, Request, Response};
use super::naming::{CacheNaming, Ownership, Partition};
use super::policy::{Route, RoutePolicy};
use super::storage::{body_digest, CacheStorage};
use super::traits::{CacheSource, CachedResponse, FetchError, Fetcher};

/// Resources fetched and stored verbatim at install time.
pub const DEFAULT_PRECACHE: &[&str] = &["/", "/index.html", "/manifest.webmanifest", "/favicon.ico"];

/// Canonical app shell document served for navigations.
pub const DEFAULT_SHELL: &str = "/index.html";

#[derive(Error, Debug)]
pub enum CacheError {
  #[error("Precache of {url} failed: {source}")]
  Precache {
    url: String,
    #[source]
    source: FetchError,
  },

  #[error("Precache of {url} returned status {status}")]
  PrecacheStatus { url: String, status: u16 },

  #[error("Invalid resource path {path}: {source}")]
  InvalidPath {
    path: String,
    #[source]
    source: url::ParseError,
  },

  #[error("Cache storage error: {0}")]
  Storage(color_eyre::Report),
}

/// Lifecycle of one controller version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  Parsed,
  Installing,
  /// Installed and waiting to take over
  Installed,
  Activating,
  Activated,
  /// Install failed with nothing to fall back to
  Redundant,
}

/// Messages the application can post to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
  /// Activate a waiting install now
  SkipWaiting,
  /// Delete every cache unconditionally
  ClearCache,
}

/// A response handed back to the caller.
#[derive(Debug, Clone)]
pub struct Served {
  pub response: Response,
  pub source: CacheSource,
}

impl Served {
  fn network(response: Response) -> Self {
    Self {
      response,
      source: CacheSource::Network,
    }
  }

  fn cached(cached: CachedResponse) -> Self {
    Self {
      response: cached.response,
      source: CacheSource::Cache,
    }
  }

  fn placeholder(response: Response) -> Self {
    Self {
      response,
      source: CacheSource::Placeholder,
    }
  }
}

/// Result of intercepting a request.
#[derive(Debug, Clone)]
pub enum Outcome {
  /// Not intercepted; the caller talks to the network directly
  Passthrough,
  Respond(Served),
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
  pub origin: Url,
  pub naming: CacheNaming,
  pub policy: RoutePolicy,
  pub precache: Vec<String>,
  pub shell: String,
  /// Activate as soon as install finishes instead of waiting for a
  /// `SkipWaiting` message
  pub skip_waiting: bool,
}

impl ControllerOptions {
  pub fn new(origin: Url, app: &str, version: &str) -> Self {
    Self {
      policy: RoutePolicy::new(&origin),
      naming: CacheNaming::new(app, version),
      origin,
      precache: DEFAULT_PRECACHE.iter().map(|s| s.to_string()).collect(),
      shell: DEFAULT_SHELL.to_string(),
      skip_waiting: true,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshKind {
  /// Also overwrite the canonical shell document
  Navigation,
  Revalidate,
}

struct Inner<S, F> {
  storage: S,
  fetcher: F,
  naming: CacheNaming,
  policy: RoutePolicy,
  precache: Vec<Request>,
  shell_key: String,
  skip_waiting: bool,
  online: AtomicBool,
  controlling: AtomicBool,
  state: Mutex<WorkerState>,
  refreshes: Mutex<Vec<JoinHandle<()>>>,
}

/// Offline-first resource cache.
///
/// Cloning is cheap; clones share storage, state and background work.
pub struct ResourceCache<S: CacheStorage, F: Fetcher> {
  inner: Arc<Inner<S, F>>,
}

impl<S: CacheStorage, F: Fetcher> Clone for ResourceCache<S, F> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<S: CacheStorage, F: Fetcher> ResourceCache<S, F> {
  pub fn new(storage: S, fetcher: F, options: ControllerOptions) -> Result<Self, CacheError> {
    let resolve = |path: &String| {
      options
        .origin
        .join(path)
        .map_err(|source| CacheError::InvalidPath {
          path: path.clone(),
          source,
        })
    };

    let precache = options
      .precache
      .iter()
      .map(|path| resolve(path).map(Request::get))
      .collect::<Result<Vec<_>, _>>()?;
    let shell_key = Request::get(resolve(&options.shell)?).cache_key();

    Ok(Self {
      inner: Arc::new(Inner {
        storage,
        fetcher,
        naming: options.naming,
        policy: options.policy,
        precache,
        shell_key,
        skip_waiting: options.skip_waiting,
        online: AtomicBool::new(true),
        controlling: AtomicBool::new(false),
        state: Mutex::new(WorkerState::Parsed),
        refreshes: Mutex::new(Vec::new()),
      }),
    })
  }

  pub fn storage(&self) -> &S {
    &self.inner.storage
  }

  pub fn naming(&self) -> &CacheNaming {
    &self.inner.naming
  }

  pub fn state(&self) -> WorkerState {
    *lock(&self.inner.state)
  }

  /// Whether this version governs requests from open clients.
  pub fn is_controlling(&self) -> bool {
    self.inner.controlling.load(Ordering::SeqCst)
  }

  /// Connectivity hint; background revalidation only runs while online.
  pub fn set_online(&self, online: bool) {
    self.inner.online.store(online, Ordering::SeqCst);
  }

  pub fn is_online(&self) -> bool {
    self.inner.online.load(Ordering::SeqCst)
  }

  fn set_state(&self, state: WorkerState) -> WorkerState {
    std::mem::replace(&mut *lock(&self.inner.state), state)
  }

  /// Populate the static partition from the precache manifest.
  ///
  /// Every manifest entry must come back with a 2xx status or nothing is
  /// written and the previous installation stays in place.
  pub async fn install(&self) -> Result<(), CacheError> {
    let previous = self.set_state(WorkerState::Installing);
    info!(version = %self.inner.naming.version(), "Installing resource cache");

    match self.precache().await {
      Ok(count) => {
        info!(count, "Precached static resources");
        self.set_state(WorkerState::Installed);
        if self.inner.skip_waiting {
          self.activate()?;
        }
        Ok(())
      }
      Err(e) => {
        error!(error = %e, "Precache failed");
        self.set_state(match previous {
          WorkerState::Parsed | WorkerState::Installing | WorkerState::Redundant => {
            WorkerState::Redundant
          }
          other => other,
        });
        Err(e)
      }
    }
  }

  async fn precache(&self) -> Result<usize, CacheError> {
    let inner = &self.inner;
    let name = inner.naming.name(Partition::Static);

    let responses = try_join_all(inner.precache.iter().map(|request| async move {
      let url = request.cache_key();
      let response = inner
        .fetcher
        .fetch(request)
        .await
        .map_err(|source| CacheError::Precache {
          url: url.clone(),
          source,
        })?;
      if !response.is_ok() {
        return Err(CacheError::PrecacheStatus {
          url,
          status: response.status,
        });
      }
      Ok((url, response))
    }))
    .await?;

    inner
      .storage
      .put_all(&name, &responses)
      .map_err(CacheError::Storage)?;

    Ok(responses.len())
  }

  /// Delete caches from other versions and take control of open clients.
  ///
  /// Returns the names of the deleted caches.
  pub fn activate(&self) -> Result<Vec<String>, CacheError> {
    self.set_state(WorkerState::Activating);
    info!(version = %self.inner.naming.version(), "Activating resource cache");

    let mut deleted = Vec::new();
    for name in self.inner.storage.keys().map_err(CacheError::Storage)? {
      if self.inner.naming.classify(&name) != Ownership::Stale {
        continue;
      }
      info!(cache = %name, "Deleting old cache");
      if self.inner.storage.delete(&name).map_err(CacheError::Storage)? {
        deleted.push(name);
      }
    }

    self.set_state(WorkerState::Activated);
    self.inner.controlling.store(true, Ordering::SeqCst);
    info!("Resource cache activated, clients claimed");

    Ok(deleted)
  }

  pub fn handle_message(&self, message: ControlMessage) -> Result<(), CacheError> {
    match message {
      ControlMessage::SkipWaiting => {
        let state = self.state();
        if state == WorkerState::Installed {
          self.activate()?;
        } else {
          debug!(?state, "Skip waiting requested with no pending install");
        }
      }
      ControlMessage::ClearCache => {
        let names = self.inner.storage.keys().map_err(CacheError::Storage)?;
        for name in &names {
          self.inner.storage.delete(name).map_err(CacheError::Storage)?;
        }
        info!(count = names.len(), "Cleared all caches");
      }
    }
    Ok(())
  }

  /// Decide how to answer an intercepted request.
  pub async fn handle(&self, request: Request) -> Result<Outcome, FetchError> {
    let route = self.inner.policy.classify(&request);
    debug!(url = %request.url, ?route, "Intercepted request");

    let served = match route {
      Route::Passthrough => return Ok(Outcome::Passthrough),
      Route::Font => self.serve_font(request).await,
      Route::Navigation => self.serve_navigation(request).await?,
      Route::BuildAsset => self.serve_build_asset(request).await?,
      Route::SameOrigin => self.serve_same_origin(request).await?,
    };

    Ok(Outcome::Respond(served))
  }

  /// Wait for every background refresh started so far.
  pub async fn settle(&self) {
    loop {
      let pending = std::mem::take(&mut *lock(&self.inner.refreshes));
      if pending.is_empty() {
        break;
      }
      for handle in pending {
        if let Err(e) = handle.await {
          warn!(error = %e, "Background refresh task failed");
        }
      }
    }
  }

  async fn serve_font(&self, request: Request) -> Served {
    let inner = &self.inner;
    let key = request.cache_key();

    if let Some(hit) = inner.lookup(&key) {
      return Served::cached(hit);
    }

    match inner.fetcher.fetch(&request).await {
      Ok(response) => {
        inner.store(Partition::Dynamic, &key, &response);
        Served::network(response)
      }
      Err(e) => {
        warn!(url = %request.url, error = %e, "Font unavailable, serving empty response");
        Served::placeholder(Response::empty())
      }
    }
  }

  async fn serve_navigation(&self, request: Request) -> Result<Served, FetchError> {
    let inner = &self.inner;
    let key = request.cache_key();

    let cached = inner
      .lookup(&key)
      .or_else(|| inner.lookup_in(Partition::Static, &inner.shell_key));
    if let Some(hit) = cached {
      self.spawn_refresh(request, RefreshKind::Navigation);
      return Ok(Served::cached(hit));
    }

    let response = inner.fetcher.fetch(&request).await?;
    inner.store(Partition::Dynamic, &key, &response);
    inner.store(Partition::Static, &inner.shell_key, &response);
    Ok(Served::network(response))
  }

  async fn serve_build_asset(&self, request: Request) -> Result<Served, FetchError> {
    let inner = &self.inner;
    let key = request.cache_key();

    // Hashed filenames never go stale
    if let Some(hit) = inner.lookup(&key) {
      return Ok(Served::cached(hit));
    }

    let response = inner.fetcher.fetch(&request).await?;
    inner.store(Partition::Dynamic, &key, &response);
    Ok(Served::network(response))
  }

  async fn serve_same_origin(&self, request: Request) -> Result<Served, FetchError> {
    let inner = &self.inner;
    let key = request.cache_key();

    if let Some(hit) = inner.lookup(&key) {
      if self.is_online() {
        self.spawn_refresh(request, RefreshKind::Revalidate);
      }
      return Ok(Served::cached(hit));
    }

    match inner.fetcher.fetch(&request).await {
      Ok(response) => {
        if inner.policy.is_cacheable(&request) {
          inner.store(Partition::Dynamic, &key, &response);
        }
        Ok(Served::network(response))
      }
      Err(e) if request.destination == Destination::Image => {
        warn!(url = %request.url, error = %e, "Image unavailable, serving placeholder");
        Ok(Served::placeholder(Response::placeholder_image()))
      }
      Err(e) => {
        warn!(url = %request.url, error = %e, "Fetch failed");
        Err(e)
      }
    }
  }

  fn spawn_refresh(&self, request: Request, kind: RefreshKind) {
    let inner = Arc::clone(&self.inner);
    let handle = tokio::spawn(async move { inner.refresh(request, kind).await });

    let mut refreshes = lock(&self.inner.refreshes);
    refreshes.retain(|h| !h.is_finished());
    refreshes.push(handle);
  }
}

impl<S: CacheStorage, F: Fetcher> Inner<S, F> {
  /// Find a key in the current partitions. Runtime copies in the dynamic
  /// partition are newer than the install-time ones, so they win.
  fn locate(&self, key: &str) -> Option<(Partition, CachedResponse)> {
    Partition::ALL
      .into_iter()
      .find_map(|partition| self.lookup_in(partition, key).map(|cached| (partition, cached)))
  }

  fn lookup_in(&self, partition: Partition, key: &str) -> Option<CachedResponse> {
    match self.storage.match_in(&self.naming.name(partition), key) {
      Ok(hit) => hit,
      Err(e) => {
        warn!(%partition, key, error = %e, "Cache lookup failed");
        None
      }
    }
  }

  fn lookup(&self, key: &str) -> Option<CachedResponse> {
    let hit = self.locate(key).map(|(_, cached)| cached);
    debug!(key, hit = hit.is_some(), "Cache lookup");
    hit
  }

  /// Best-effort write. Only 2xx responses are kept and a failed write never
  /// reaches the caller.
  fn store(&self, partition: Partition, key: &str, response: &Response) {
    if !response.is_ok() {
      debug!(key, status = response.status, "Not caching unsuccessful response");
      return;
    }
    if let Err(e) = self
      .storage
      .put(&self.naming.name(partition), key, response)
    {
      warn!(%partition, key, error = %e, "Failed to write cache entry");
    }
  }

  /// Refetch `request` and write a 2xx result to the dynamic partition,
  /// plus the shell entry of the static partition for navigations.
  async fn refresh(&self, request: Request, kind: RefreshKind) {
    let key = request.cache_key();

    let response = match self.fetcher.fetch(&request).await {
      Ok(response) => response,
      Err(e) => {
        debug!(key, error = %e, "Background refresh failed");
        return;
      }
    };
    if !response.is_ok() {
      debug!(key, status = response.status, "Background refresh returned error status");
      return;
    }

    match self.locate(&key) {
      Some((partition, cached)) => debug!(
        key,
        %partition,
        cached_at = %cached.cached_at,
        unchanged = cached.digest == body_digest(&response.body),
        "Background refresh complete"
      ),
      None => debug!(key, "Background refresh complete, entry was evicted"),
    }

    self.store(Partition::Dynamic, &key, &response);
    if kind == RefreshKind::Navigation {
      self.store(Partition::Static, &self.shell_key, &response);
    }
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|e| e.into_inner())
}
