use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
  Get,
  Post,
  Put,
  Patch,
  Delete,
  Head,
  Options,
}

impl HttpMethod {
  pub(crate) fn to_reqwest(self) -> reqwest::Method {
    match self {
      HttpMethod::Get => reqwest::Method::GET,
      HttpMethod::Post => reqwest::Method::POST,
      HttpMethod::Put => reqwest::Method::PUT,
      HttpMethod::Patch => reqwest::Method::PATCH,
      HttpMethod::Delete => reqwest::Method::DELETE,
      HttpMethod::Head => reqwest::Method::HEAD,
      HttpMethod::Options => reqwest::Method::OPTIONS,
    }
  }
}

/// Credentials attached to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Authentication {
  Bearer { token: String },
  Basic { username: String, password: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
  Json(serde_json::Value),
  Bytes(Vec<u8>),
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
  pub method: HttpMethod,
  pub url: String,
  pub headers: Vec<(String, String)>,
  pub body: Option<RequestBody>,
  pub auth: Option<Authentication>,
  /// Largest response body to read. Reading stops with
  /// [`crate::HttpError::BodyTooLarge`] once it is passed.
  pub max_body_bytes: Option<usize>,
}

impl HttpRequest {
  pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
    Self {
      method,
      url: url.into(),
      headers: Vec::new(),
      body: None,
      auth: None,
      max_body_bytes: None,
    }
  }

  pub fn get(url: impl Into<String>) -> Self {
    Self::new(HttpMethod::Get, url)
  }

  pub fn post(url: impl Into<String>) -> Self {
    Self::new(HttpMethod::Post, url)
  }

  pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn json(mut self, body: serde_json::Value) -> Self {
    self.body = Some(RequestBody::Json(body));
    self
  }

  pub fn bytes(mut self, body: Vec<u8>) -> Self {
    self.body = Some(RequestBody::Bytes(body));
    self
  }

  pub fn auth(mut self, auth: Authentication) -> Self {
    self.auth = Some(auth);
    self
  }

  pub fn max_body_bytes(mut self, limit: usize) -> Self {
    self.max_body_bytes = Some(limit);
    self
  }
}

/// A received response. Header names are lowercased.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HttpResponse {
  pub status: u16,
  pub headers: HashMap<String, String>,
  pub body: Vec<u8>,
}

impl HttpResponse {
  pub fn new(status: u16) -> Self {
    Self {
      status,
      ..Default::default()
    }
  }

  pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
    self.headers.insert(name.to_ascii_lowercase(), value.into());
    self
  }

  pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
    self.body = body.into();
    self
  }

  /// Look up a header case-insensitively.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .get(&name.to_ascii_lowercase())
      .map(|v| v.as_str())
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Body as UTF-8 text, replacing invalid sequences.
  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }

  pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
    serde_json::from_slice(&self.body)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_method_from_config() {
    let method: HttpMethod = serde_json::from_value(json!("PATCH")).unwrap();
    assert_eq!(method, HttpMethod::Patch);
    assert!(serde_json::from_value::<HttpMethod>(json!("TRACE")).is_err());
  }

  #[test]
  fn test_header_lookup_is_case_insensitive() {
    let response = HttpResponse::new(200).with_header("Content-Type", "image/png");
    assert_eq!(response.header("content-type"), Some("image/png"));
    assert_eq!(response.header("CONTENT-TYPE"), Some("image/png"));
    assert_eq!(response.header("content-disposition"), None);
  }

  #[test]
  fn test_json_body() {
    let response = HttpResponse::new(200).with_body(br#"{"records": [1, 2]}"#.to_vec());
    let value: serde_json::Value = response.json().unwrap();
    assert_eq!(value, json!({ "records": [1, 2] }));
    assert!(response.is_success());
  }

  #[test]
  fn test_request_builder() {
    let request = HttpRequest::post("https://api.example.com/rows")
      .header("X-Trace", "abc")
      .json(json!({ "name": "row" }))
      .auth(Authentication::Bearer {
        token: "secret".to_string(),
      });

    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.headers, vec![("X-Trace".to_string(), "abc".to_string())]);
    assert!(matches!(request.body, Some(RequestBody::Json(_))));
  }
}
