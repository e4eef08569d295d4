//! Shared HTTP client for the hosted backend's REST surface.

use std::{
  sync::{Arc, RwLock},
  time::Duration,
};

use reqwest::{Client, RequestBuilder, StatusCode, header};

use crate::error::{Error, Result};

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct RestConfig {
  /// Base URL of the backend, e.g. `https://abc.example.co`.
  pub base_url:     String,
  /// The public (anon) API key, sent with every request.
  pub api_key:      String,
  /// Request timeout in seconds.
  pub timeout_secs: u64,
}

impl RestConfig {
  pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
    Self {
      base_url: base_url.into(),
      api_key: api_key.into(),
      timeout_secs: 30,
    }
  }
}

/// HTTP client for the backend's REST, auth and storage endpoints.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based and
/// the bearer-token slot is shared, so a sign-in through one clone is
/// visible to all of them.
#[derive(Clone)]
pub struct RestClient {
  config: RestConfig,
  http:   Client,
  bearer: Arc<RwLock<Option<String>>>,
}

impl RestClient {
  pub fn new(config: RestConfig) -> Result<Self> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
      "apikey",
      header::HeaderValue::from_str(&config.api_key)
        .map_err(|_| Error::Auth("api key is not a valid header value".into()))?,
    );

    let http = Client::builder()
      .default_headers(headers)
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;

    Ok(Self { config, http, bearer: Arc::new(RwLock::new(None)) })
  }

  fn base(&self) -> &str {
    self.config.base_url.trim_end_matches('/')
  }

  /// `{base}/rest/v1/{table}`
  pub fn table_url(&self, table: &str) -> String {
    format!("{}/rest/v1/{}", self.base(), table)
  }

  /// `{base}/auth/v1/{path}`
  pub fn auth_url(&self, path: &str) -> String {
    format!("{}/auth/v1/{}", self.base(), path)
  }

  /// `{base}/storage/v1/object/{bucket}/{path}`
  pub fn storage_url(&self, bucket: &str, path: &str) -> String {
    format!("{}/storage/v1/object/{}/{}", self.base(), bucket, path)
  }

  /// The public, unauthenticated URL a stored object is served from.
  pub fn public_object_url(&self, bucket: &str, path: &str) -> String {
    format!("{}/storage/v1/object/public/{}/{}", self.base(), bucket, path)
  }

  // ── Bearer token ──────────────────────────────────────────────────────

  pub(crate) fn set_bearer(&self, token: impl Into<String>) {
    *self.bearer.write().expect("bearer lock poisoned") = Some(token.into());
  }

  pub(crate) fn clear_bearer(&self) {
    *self.bearer.write().expect("bearer lock poisoned") = None;
  }

  pub(crate) fn bearer(&self) -> Option<String> {
    self.bearer.read().expect("bearer lock poisoned").clone()
  }

  // ── Requests ──────────────────────────────────────────────────────────

  pub(crate) fn get(&self, url: &str) -> RequestBuilder {
    self.authorize(self.http.get(url))
  }

  pub(crate) fn post(&self, url: &str) -> RequestBuilder {
    self.authorize(self.http.post(url))
  }

  pub(crate) fn patch(&self, url: &str) -> RequestBuilder {
    self.authorize(self.http.patch(url))
  }

  pub(crate) fn delete(&self, url: &str) -> RequestBuilder {
    self.authorize(self.http.delete(url))
  }

  /// Attach the session's bearer token when one exists. The anon api
  /// key alone identifies unauthenticated visitors; the bearer lets
  /// the backend's row policies see who is writing.
  fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
    match self.bearer() {
      Some(token) => req.bearer_auth(token),
      None => req,
    }
  }

  /// Decode a JSON response, folding non-success statuses into
  /// [`Error::Server`] and 404 into [`Error::NotFound`].
  pub(crate) async fn handle<T: serde::de::DeserializeOwned>(
    &self,
    response: reqwest::Response,
  ) -> Result<T> {
    if response.status() == StatusCode::NOT_FOUND {
      return Err(Error::NotFound);
    }
    if !response.status().is_success() {
      let status = response.status().as_u16();
      let message = response.text().await.unwrap_or_default();
      return Err(Error::Server { status, message });
    }
    Ok(response.json().await?)
  }

  /// Like [`Self::handle`] but for endpoints whose body is irrelevant.
  pub(crate) async fn expect_success(
    &self,
    response: reqwest::Response,
  ) -> Result<()> {
    if !response.status().is_success() {
      let status = response.status().as_u16();
      let message = response.text().await.unwrap_or_default();
      return Err(Error::Server { status, message });
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client() -> RestClient {
    RestClient::new(RestConfig::new("https://blog.example.co/", "anon-key"))
      .unwrap()
  }

  #[test]
  fn urls_are_rooted_under_each_service() {
    let c = client();
    assert_eq!(c.table_url("posts"), "https://blog.example.co/rest/v1/posts");
    assert_eq!(
      c.auth_url("token?grant_type=password"),
      "https://blog.example.co/auth/v1/token?grant_type=password"
    );
    assert_eq!(
      c.public_object_url("posts", "images/a.png"),
      "https://blog.example.co/storage/v1/object/public/posts/images/a.png"
    );
  }

  #[test]
  fn bearer_slot_is_shared_between_clones() {
    let a = client();
    let b = a.clone();
    a.set_bearer("tok");
    assert_eq!(b.bearer().as_deref(), Some("tok"));
    b.clear_bearer();
    assert_eq!(a.bearer(), None);
  }
}
