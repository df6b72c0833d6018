//! Network access through reqwest.

use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use super::http::{Request, Response};
use super::traits::{FetchError, Fetcher};

/// HTTP fetcher backed by a shared reqwest client.
///
/// No timeout is configured; a hung request lasts as long as the
/// transport lets it.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
  offline: bool,
}

impl HttpFetcher {
  pub fn new() -> Result<Self, FetchError> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("piggyback/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self {
      client,
      offline: false,
    })
  }

  /// Refuse every request as if the device had no connectivity.
  pub fn with_offline(mut self, offline: bool) -> Self {
    self.offline = offline;
    self
  }
}

impl Fetcher for HttpFetcher {
  async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
    if self.offline {
      return Err(FetchError::Offline(request.url.to_string()));
    }

    let response = self
      .client
      .request(request.method.clone(), request.url.clone())
      .send()
      .await?;

    let status = response.status().as_u16();
    let content_type = response
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(String::from);
    let body = response.bytes().await?.to_vec();

    debug!(url = %request.url, status, bytes = body.len(), "Fetched from network");

    Ok(Response {
      status,
      content_type,
      body,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  #[tokio::test]
  async fn test_offline_fetcher_never_touches_network() {
    let fetcher = HttpFetcher::new().unwrap().with_offline(true);
    let request = Request::get(Url::parse("http://localhost:5000/index.html").unwrap());

    let result = fetcher.fetch(&request).await;
    assert!(matches!(result, Err(FetchError::Offline(url)) if url.ends_with("/index.html")));
  }
}
