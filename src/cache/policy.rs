//! Per-request routing for the cache controller.

use reqwest::Method;
use url::{Origin, Url};

use super::http::{Destination, Request, RequestMode};

/// Strategy chosen for one intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  /// Not intercepted; the request goes straight to the network
  Passthrough,
  /// Cross-origin font: cache-first with an empty placeholder on failure
  Font,
  /// Full page load: cached shell first, refreshed in the background
  Navigation,
  /// Content-hashed build output: cache-first, never revalidated
  BuildAsset,
  /// Any other same-origin GET: cache-first with conditional revalidation
  SameOrigin,
}

/// File suffixes worth persisting when no more specific rule applies.
pub const DEFAULT_CACHEABLE_EXTENSIONS: &[&str] = &[
  "js", "mjs", "css", "woff", "woff2", "ttf", "otf", "eot", "png", "jpg", "jpeg", "gif", "svg",
  "webp", "avif", "ico",
];

pub const DEFAULT_FONT_HOSTS: &[&str] = &["fonts.googleapis.com", "fonts.gstatic.com"];

pub const DEFAULT_BUILD_PREFIX: &str = "/assets/";

#[derive(Debug, Clone)]
pub struct RoutePolicy {
  origin: Origin,
  font_hosts: Vec<String>,
  build_prefix: String,
  cacheable_extensions: Vec<String>,
}

impl RoutePolicy {
  pub fn new(origin: &Url) -> Self {
    Self {
      origin: origin.origin(),
      font_hosts: DEFAULT_FONT_HOSTS.iter().map(|s| s.to_string()).collect(),
      build_prefix: DEFAULT_BUILD_PREFIX.to_string(),
      cacheable_extensions: DEFAULT_CACHEABLE_EXTENSIONS
        .iter()
        .map(|s| s.to_string())
        .collect(),
    }
  }

  pub fn with_font_hosts(mut self, hosts: Vec<String>) -> Self {
    self.font_hosts = hosts;
    self
  }

  pub fn with_build_prefix(mut self, prefix: impl Into<String>) -> Self {
    self.build_prefix = prefix.into();
    self
  }

  pub fn with_cacheable_extensions(mut self, extensions: Vec<String>) -> Self {
    self.cacheable_extensions = extensions
      .into_iter()
      .map(|e| e.trim_start_matches('.').to_lowercase())
      .collect();
    self
  }

  pub fn classify(&self, request: &Request) -> Route {
    if request.method != Method::GET {
      return Route::Passthrough;
    }
    if !matches!(request.url.scheme(), "http" | "https") {
      return Route::Passthrough;
    }

    if request.url.origin() != self.origin {
      return if self.is_font(request) {
        Route::Font
      } else {
        Route::Passthrough
      };
    }

    if request.mode == RequestMode::Navigate {
      Route::Navigation
    } else if self.is_build_asset(&request.url) {
      Route::BuildAsset
    } else {
      Route::SameOrigin
    }
  }

  /// Whether an otherwise uncategorized successful response should be kept.
  pub fn is_cacheable(&self, request: &Request) -> bool {
    if self.is_build_asset(&request.url) {
      return true;
    }

    let path = request.url.path();
    let file = path.rsplit('/').next().unwrap_or_default();
    match file.rsplit_once('.') {
      Some((_, ext)) => {
        let ext = ext.to_lowercase();
        self.cacheable_extensions.iter().any(|e| *e == ext)
      }
      None => false,
    }
  }

  fn is_build_asset(&self, url: &Url) -> bool {
    url.path().starts_with(&self.build_prefix)
  }

  fn is_font(&self, request: &Request) -> bool {
    if request.destination == Destination::Font {
      return true;
    }
    let host = request.url.host_str().unwrap_or_default();
    self.font_hosts.iter().any(|h| host == h || host.ends_with(&format!(".{}", h)))
  }
}
