use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::HttpError;
use crate::policy::check_url;
use crate::types::{Authentication, HttpRequest, HttpResponse, RequestBody};

/// The HTTP fetch collaborator.
#[async_trait]
pub trait HttpClient: Send + Sync {
  /// Send a request and return the full response.
  async fn send_request(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;

  /// Send a request, giving up as soon as `cancel` fires.
  async fn send_cancellable(
    &self,
    request: HttpRequest,
    cancel: &CancellationToken,
  ) -> Result<HttpResponse, HttpError> {
    tokio::select! {
      _ = cancel.cancelled() => Err(HttpError::Cancelled),
      result = self.send_request(request) => result,
    }
  }
}

/// Configuration for [`ReqwestClient`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
  /// Per-request timeout. `None` disables the timeout.
  pub timeout_ms: Option<u64>,
  /// URL schemes requests may use.
  pub allowed_schemes: Vec<String>,
}

impl Default for HttpClientConfig {
  fn default() -> Self {
    Self {
      timeout_ms: Some(30_000),
      allowed_schemes: vec!["http".to_string(), "https".to_string()],
    }
  }
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
  client: reqwest::Client,
  config: HttpClientConfig,
}

impl ReqwestClient {
  pub fn new(config: HttpClientConfig) -> Self {
    Self {
      client: reqwest::Client::new(),
      config,
    }
  }

  pub fn config(&self) -> &HttpClientConfig {
    &self.config
  }
}

impl Default for ReqwestClient {
  fn default() -> Self {
    Self::new(HttpClientConfig::default())
  }
}

#[async_trait]
impl HttpClient for ReqwestClient {
  async fn send_request(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
    let url = check_url(&request.url, &self.config.allowed_schemes)?;
    debug!(method = ?request.method, url = %url, "sending request");

    let mut builder = self.client.request(request.method.to_reqwest(), url);

    for (name, value) in &request.headers {
      builder = builder.header(name, value);
    }

    builder = match request.auth {
      Some(Authentication::Bearer { token }) => builder.bearer_auth(token),
      Some(Authentication::Basic { username, password }) => {
        builder.basic_auth(username, Some(password))
      }
      None => builder,
    };

    builder = match request.body {
      Some(RequestBody::Json(body)) => builder.json(&body),
      Some(RequestBody::Bytes(body)) => builder.body(body),
      None => builder,
    };

    if let Some(timeout_ms) = self.config.timeout_ms {
      builder = builder.timeout(Duration::from_millis(timeout_ms));
    }

    let response = builder.send().await.map_err(|e| {
      if e.is_timeout() {
        HttpError::Timeout {
          timeout_ms: self.config.timeout_ms.unwrap_or_default(),
        }
      } else {
        HttpError::Request(e)
      }
    })?;

    let status = response.status().as_u16();
    let headers = response
      .headers()
      .iter()
      .filter_map(|(k, v)| {
        v.to_str()
          .ok()
          .map(|val| (k.as_str().to_ascii_lowercase(), val.to_string()))
      })
      .collect();
    let body = match request.max_body_bytes {
      Some(limit) => read_limited(response, limit).await?,
      None => response.bytes().await?.to_vec(),
    };

    Ok(HttpResponse {
      status,
      headers,
      body,
    })
  }
}

/// Read a body chunk by chunk, giving up as soon as it passes `limit`.
async fn read_limited(mut response: reqwest::Response, limit: usize) -> Result<Vec<u8>, HttpError> {
  if response
    .content_length()
    .is_some_and(|declared| declared > limit as u64)
  {
    return Err(HttpError::BodyTooLarge { limit });
  }

  let mut body = Vec::new();
  while let Some(chunk) = response.chunk().await? {
    if body.len() + chunk.len() > limit {
      return Err(HttpError::BodyTooLarge { limit });
    }
    body.extend_from_slice(&chunk);
  }
  Ok(body)
}
