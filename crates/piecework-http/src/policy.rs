use url::Url;

use crate::error::HttpError;

/// Parse `raw` and check it against the allowed schemes.
///
/// Relative URLs (no scheme) are rejected as invalid.
pub fn check_url(raw: &str, allowed_schemes: &[String]) -> Result<Url, HttpError> {
  let url = Url::parse(raw.trim()).map_err(|e| HttpError::InvalidUrl {
    url: raw.to_string(),
    message: e.to_string(),
  })?;

  if url.cannot_be_a_base() || url.host_str().is_none() {
    return Err(HttpError::InvalidUrl {
      url: raw.to_string(),
      message: "url has no host".to_string(),
    });
  }

  if !allowed_schemes.iter().any(|s| s == url.scheme()) {
    return Err(HttpError::SchemeNotAllowed {
      scheme: url.scheme().to_string(),
    });
  }

  Ok(url)
}
