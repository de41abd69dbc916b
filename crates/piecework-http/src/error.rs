use thiserror::Error;

/// Errors that can occur while sending a request.
///
/// A non-2xx status is not an error: it is returned in the response.
#[derive(Debug, Error)]
pub enum HttpError {
  /// The URL could not be parsed or is not absolute.
  #[error("invalid url '{url}': {message}")]
  InvalidUrl { url: String, message: String },

  /// The URL scheme is not allowed by policy.
  #[error("scheme '{scheme}' is not allowed")]
  SchemeNotAllowed { scheme: String },

  /// Transport failure.
  #[error("http error: {0}")]
  Request(#[from] reqwest::Error),

  /// The request did not finish within the configured timeout.
  #[error("request timed out after {timeout_ms}ms")]
  Timeout { timeout_ms: u64 },

  /// The response body is larger than the request allows.
  #[error("response body exceeds {limit} bytes")]
  BodyTooLarge { limit: usize },

  /// The caller cancelled the request.
  #[error("request cancelled")]
  Cancelled,
}
