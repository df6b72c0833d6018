//! Request and response values flowing through the cache controller.

use reqwest::Method;
use url::Url;

/// How the request was initiated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestMode {
  /// Full page load
  Navigate,
  /// Subresource fetch
  #[default]
  Cors,
}

/// What kind of resource the caller expects back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Destination {
  #[default]
  Empty,
  Document,
  Script,
  Style,
  Font,
  Image,
  Manifest,
}

/// An intercepted resource request.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  pub url: Url,
  pub mode: RequestMode,
  pub destination: Destination,
}

impl Request {
  /// Plain GET for a subresource.
  pub fn get(url: Url) -> Self {
    Self {
      method: Method::GET,
      url,
      mode: RequestMode::default(),
      destination: Destination::default(),
    }
  }

  /// Full page navigation.
  pub fn navigate(url: Url) -> Self {
    Self {
      method: Method::GET,
      url,
      mode: RequestMode::Navigate,
      destination: Destination::Document,
    }
  }

  pub fn with_method(mut self, method: Method) -> Self {
    self.method = method;
    self
  }

  pub fn with_destination(mut self, destination: Destination) -> Self {
    self.destination = destination;
    self
  }

  /// Key under which the response is stored. Fragments never reach the
  /// network, so they are not part of the key.
  pub fn cache_key(&self) -> String {
    let mut url = self.url.clone();
    url.set_fragment(None);
    url.to_string()
  }
}

/// A response, either fresh from the network, replayed from a cache, or
/// synthesized as a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub status: u16,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

/// Glyph served in place of images that are neither cached nor reachable.
const PLACEHOLDER_IMAGE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24" fill="none" stroke="currentColor"><circle cx="12" cy="12" r="10"/><path d="M12 8v4M12 16h.01"/></svg>"#;

impl Response {
  pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      content_type: content_type.map(String::from),
      body: body.into(),
    }
  }

  /// Empty 200 used when a font cannot be supplied.
  pub fn empty() -> Self {
    Self::new(200, None, Vec::new())
  }

  pub fn placeholder_image() -> Self {
    Self::new(200, Some("image/svg+xml"), PLACEHOLDER_IMAGE)
  }

  /// 2xx status. Only these responses are ever written to a cache.
  pub fn is_ok(&self) -> bool {
    (200..300).contains(&self.status)
  }
}
