//! The HTTP access layer: one choke point for every outbound call.
//!
//! Owns the base URL, the client-side timeout, bearer-token injection and
//! the 401 interception contract. JSON and multipart requests go through
//! the same `build_request` so the auth-header logic cannot diverge.

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::{Config, API_PREFIX};
use crate::session::SessionStore;

use super::envelope::Envelope;
use super::error::ApiError;

/// Body encoding for an outbound request.
pub enum RequestBody {
  Empty,
  Json(serde_json::Value),
  Multipart(reqwest::multipart::Form),
}

/// Configured HTTP client wrapping all network calls to the backend.
#[derive(Clone)]
pub struct HttpClient {
  http: reqwest::Client,
  base: Url,
  session: Arc<SessionStore>,
}

impl HttpClient {
  pub fn new(config: &Config, session: Arc<SessionStore>) -> Result<Self, ApiError> {
    let base = Url::parse(&format!(
      "{}{}/",
      config.api.base_url.trim_end_matches('/'),
      API_PREFIX
    ))?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.api.timeout_secs))
      .build()?;

    Ok(Self { http, base, session })
  }

  pub fn session(&self) -> &Arc<SessionStore> {
    &self.session
  }

  fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
    Ok(self.base.join(path.trim_start_matches('/'))?)
  }

  /// Build an outbound request: resolve the URL, attach the bearer token if
  /// one is stored (session scope first), encode the body.
  ///
  /// Absence of a token is not an error; the request goes out
  /// unauthenticated and the server is the authority on rejecting it.
  fn build_request(
    &self,
    method: Method,
    url: Url,
    body: RequestBody,
  ) -> Result<reqwest::RequestBuilder, ApiError> {
    let mut request = self.http.request(method, url);

    if let Some(token) = self.session.token()? {
      request = request.bearer_auth(token);
    }

    Ok(match body {
      RequestBody::Empty => request,
      RequestBody::Json(value) => request.json(&value),
      RequestBody::Multipart(form) => request.multipart(form),
    })
  }

  async fn execute<T: DeserializeOwned>(
    &self,
    method: Method,
    path: &str,
    query: Option<&BTreeMap<String, String>>,
    body: RequestBody,
  ) -> Result<Envelope<T>, ApiError> {
    let mut url = self.endpoint(path)?;
    if let Some(params) = query {
      url.query_pairs_mut().extend_pairs(params.iter());
    }

    debug!(%url, "issuing request");
    let request = self.build_request(method, url, body)?;
    let response = request.send().await?;

    self.process(response).await
  }

  /// Normalize a server response.
  ///
  /// 2xx bodies pass through as the parsed envelope. A 401 clears the
  /// stored token (and nothing else) before the failure propagates. Other
  /// failures become the typed taxonomy in [`ApiError`].
  async fn process<T: DeserializeOwned>(
    &self,
    response: reqwest::Response,
  ) -> Result<Envelope<T>, ApiError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if status.is_success() {
      return Ok(serde_json::from_slice(&bytes)?);
    }

    if status == StatusCode::UNAUTHORIZED {
      debug!("received 401, invalidating stored token");
      self.session.clear_token()?;
    }

    let envelope = serde_json::from_slice::<Envelope<serde_json::Value>>(&bytes).ok();
    Err(ApiError::classify(status, envelope))
  }

  pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>, ApiError> {
    self
      .execute(Method::GET, path, None, RequestBody::Empty)
      .await
  }

  pub async fn get_with<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &BTreeMap<String, String>,
  ) -> Result<Envelope<T>, ApiError> {
    self
      .execute(Method::GET, path, Some(query), RequestBody::Empty)
      .await
  }

  pub async fn post<T: DeserializeOwned, B: Serialize>(
    &self,
    path: &str,
    body: &B,
  ) -> Result<Envelope<T>, ApiError> {
    let body = RequestBody::Json(serde_json::to_value(body)?);
    self.execute(Method::POST, path, None, body).await
  }

  pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>, ApiError> {
    self
      .execute(Method::POST, path, None, RequestBody::Empty)
      .await
  }

  pub async fn put<T: DeserializeOwned, B: Serialize>(
    &self,
    path: &str,
    body: &B,
  ) -> Result<Envelope<T>, ApiError> {
    let body = RequestBody::Json(serde_json::to_value(body)?);
    self.execute(Method::PUT, path, None, body).await
  }

  pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>, ApiError> {
    self
      .execute(Method::DELETE, path, None, RequestBody::Empty)
      .await
  }

  /// File-upload variant. Same auth-header path, multipart content-type,
  /// never a JSON content-type.
  pub async fn upload<T: DeserializeOwned>(
    &self,
    path: &str,
    form: reqwest::multipart::Form,
  ) -> Result<Envelope<T>, ApiError> {
    self
      .execute(Method::POST, path, None, RequestBody::Multipart(form))
      .await
  }

  /// Raw binary download, bypassing envelope parsing.
  pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, ApiError> {
    let url = self.endpoint(path)?;
    let request = self.build_request(Method::GET, url, RequestBody::Empty)?;
    let response = request.send().await?;

    let status = response.status();
    if status.is_success() {
      return Ok(response.bytes().await?.to_vec());
    }

    if status == StatusCode::UNAUTHORIZED {
      self.session.clear_token()?;
    }
    let bytes = response.bytes().await?;
    let envelope = serde_json::from_slice::<Envelope<serde_json::Value>>(&bytes).ok();
    Err(ApiError::classify(status, envelope))
  }

  /// Log out.
  ///
  /// The server notification is best-effort; client-side teardown of every
  /// persisted key in both scopes is the operation's primary contract and
  /// happens unconditionally.
  pub async fn logout(&self) -> Result<(), ApiError> {
    if let Err(err) = self.post_empty::<serde_json::Value>("/auth/logout").await {
      warn!("server logout failed, clearing local session anyway: {err}");
    }

    self.session.clear_all()?;
    Ok(())
  }
}
