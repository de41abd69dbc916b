use base64::Engine as _;
use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::mime::extension_for_media_type;

/// Accepts unpadded input and stray trailing bits.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
  &alphabet::STANDARD,
  GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::Indifferent)
    .with_decode_allow_trailing_bits(true),
);

/// Quoted filenames longer than this are treated as malformed.
const MAX_QUOTED_FILENAME: usize = 1024;

/// A file value handed to an action.
///
/// Serializes with `data` as standard base64 so property bags stay JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApFile {
  pub filename: String,
  #[serde(serialize_with = "serialize_base64", deserialize_with = "deserialize_base64")]
  pub data: Vec<u8>,
  pub extension: String,
}

impl ApFile {
  pub fn new(filename: impl Into<String>, data: Vec<u8>, extension: impl Into<String>) -> Self {
    Self {
      filename: filename.into(),
      data,
      extension: extension.into(),
    }
  }

  /// Build a file named after `filename`, taking the extension from its
  /// suffix or, failing that, from `media_type`.
  pub(crate) fn named(filename: String, data: Vec<u8>, media_type: Option<&str>) -> Self {
    let extension = match filename.rsplit_once('.') {
      Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
      _ => extension_for_media_type(media_type.unwrap_or_default()).to_string(),
    };
    Self::new(filename, data, extension)
  }

  /// Build an anonymous `unknown.<ext>` file.
  pub(crate) fn unnamed(data: Vec<u8>, media_type: &str) -> Self {
    let extension = extension_for_media_type(media_type);
    Self::new(format!("unknown.{extension}"), data, extension)
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }
}

fn serialize_base64<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
  serializer.serialize_str(&STANDARD.encode(data))
}

fn deserialize_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
  let encoded = String::deserialize(deserializer)?;
  LENIENT
    .decode(encoded.trim())
    .map_err(serde::de::Error::custom)
}

/// Parse a `data:<media-type>;base64,<payload>` URI into a file.
///
/// Returns `None` when the media type is empty, the payload is empty or
/// whitespace, the URI is not base64-encoded, or (with `strict`) the payload
/// is not valid base64. Without `strict`, invalid characters are skipped and
/// whatever decodes is kept.
pub fn parse_data_uri(raw: &str, strict: bool) -> Option<ApFile> {
  let scheme = raw.get(..5)?;
  if !scheme.eq_ignore_ascii_case("data:") {
    return None;
  }
  let rest = &raw[5..];

  const MARKER: &[u8] = b";base64,";
  let Some(at) = rest
    .as_bytes()
    .windows(MARKER.len())
    .position(|w| w.eq_ignore_ascii_case(MARKER))
  else {
    warn!("data URI is not base64 encoded");
    return None;
  };
  let header = &rest[..at];
  let payload = &rest[at + MARKER.len()..];

  let mut segments = header.split(';').map(str::trim);
  let media_type = segments.next().unwrap_or_default();
  let params: Vec<&str> = segments.collect();

  if media_type.is_empty() {
    warn!("data URI has an empty media type");
    return None;
  }
  if payload.trim().is_empty() {
    warn!(media_type, "data URI has an empty payload");
    return None;
  }

  let data = if strict {
    match STANDARD.decode(payload.trim()) {
      Ok(data) => data,
      Err(e) => {
        warn!(media_type, error = %e, "data URI payload is not valid base64");
        return None;
      }
    }
  } else {
    decode_lenient(payload)
  };

  let name = params.iter().find_map(|p| {
    let (key, value) = p.split_once('=')?;
    let key = key.trim();
    (key.eq_ignore_ascii_case("name") || key.eq_ignore_ascii_case("filename"))
      .then(|| percent_decode_str(value.trim().trim_matches('"')).decode_utf8_lossy())
      .and_then(|v| sanitize_filename(&v))
  });

  Some(match name {
    Some(filename) => ApFile::named(filename, data, Some(media_type)),
    None => ApFile::unnamed(data, media_type),
  })
}

/// Best-effort base64 decoding.
///
/// Characters outside the alphabet are skipped, the URL-safe alphabet is
/// folded into the standard one, and a dangling final character is dropped.
fn decode_lenient(payload: &str) -> Vec<u8> {
  let mut cleaned: Vec<u8> = payload
    .bytes()
    .filter_map(|b| match b {
      b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'+' | b'/' => Some(b),
      b'-' => Some(b'+'),
      b'_' => Some(b'/'),
      _ => None,
    })
    .collect();

  if cleaned.len() % 4 == 1 {
    cleaned.pop();
  }

  match LENIENT.decode(&cleaned) {
    Ok(data) => data,
    Err(e) => {
      warn!(error = %e, "base64 payload could not be decoded");
      Vec::new()
    }
  }
}

/// Extract a filename from a `Content-Disposition` header value.
///
/// `filename*=UTF-8''...` wins over `filename=...`. Quoted values must close
/// within a bounded length. Directory components are stripped.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
  extended_filename(header).or_else(|| plain_filename(header))
}

fn extended_filename(header: &str) -> Option<String> {
  let lower = header.to_ascii_lowercase();
  let start = lower.find("filename*=")? + "filename*=".len();
  let value = header[start..].split(';').next()?.trim().trim_matches('"');

  let (charset, encoded) = value.split_once('\'')?;
  if !charset.eq_ignore_ascii_case("utf-8") {
    return None;
  }
  // Skip the language tag.
  let (_, encoded) = encoded.split_once('\'')?;
  let decoded = percent_decode_str(encoded).decode_utf8().ok()?;
  sanitize_filename(&decoded)
}

fn plain_filename(header: &str) -> Option<String> {
  let lower = header.to_ascii_lowercase();
  let mut search_from = 0;

  let start = loop {
    let found = search_from + lower[search_from..].find("filename=")?;
    let preceded_by_star = found > 0 && lower.as_bytes()[found - 1] == b'*';
    if !preceded_by_star {
      break found + "filename=".len();
    }
    search_from = found + 1;
  };

  let rest = header[start..].trim_start();
  if let Some(quoted) = rest.strip_prefix('"') {
    let window = quoted
      .char_indices()
      .take_while(|(i, _)| *i <= MAX_QUOTED_FILENAME)
      .find(|(_, c)| *c == '"')
      .map(|(i, _)| i)?;
    sanitize_filename(&quoted[..window])
  } else {
    sanitize_filename(rest.split(';').next()?.trim())
  }
}

/// The last path segment of `url` when it looks like a filename.
pub(crate) fn filename_from_url_path(url: &url::Url) -> Option<String> {
  let segment = url.path_segments()?.rev().find(|s| !s.is_empty())?;
  let decoded = percent_decode_str(segment).decode_utf8_lossy();
  if !decoded.contains('.') {
    return None;
  }
  sanitize_filename(&decoded)
}

fn sanitize_filename(raw: &str) -> Option<String> {
  let name = raw.rsplit(['/', '\\']).next()?.trim();
  if name.is_empty() || name == "." || name == ".." {
    return None;
  }
  Some(name.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_png_data_uri() {
    let file = parse_data_uri("data:image/png;base64,iVBORw0KGgo=", false).unwrap();
    assert_eq!(file.extension, "png");
    assert_eq!(file.filename, "unknown.png");
    assert_eq!(file.data, vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
  }

  #[test]
  fn test_unknown_media_type_falls_back_to_bin() {
    let file = parse_data_uri("data:application/x-weird;base64,aGk=", false).unwrap();
    assert_eq!(file.extension, "bin");
    assert_eq!(file.data, b"hi");
  }

  #[test]
  fn test_empty_media_type_is_rejected() {
    assert_eq!(parse_data_uri("data:;base64,x", false), None);
  }

  #[test]
  fn test_empty_and_whitespace_payloads_are_rejected() {
    assert_eq!(parse_data_uri("data:text/plain;base64,", false), None);
    assert_eq!(parse_data_uri("data:text/plain;base64,   \n ", false), None);
  }

  #[test]
  fn test_non_base64_data_uri_is_rejected() {
    assert_eq!(parse_data_uri("data:text/plain,hello", false), None);
    assert_eq!(parse_data_uri("https://example.com/a.png", false), None);
  }

  #[test]
  fn test_invalid_base64_is_best_effort() {
    // "aGVsbG8" is "hello" unpadded; the noise is skipped.
    let file = parse_data_uri("data:text/plain;base64,aGV$$sb G8!", false).unwrap();
    assert_eq!(file.data, b"hello");
    assert_eq!(file.extension, "txt");
  }

  #[test]
  fn test_url_safe_alphabet_is_accepted() {
    // 0xfb 0xff encodes to "+/8=" in the standard alphabet.
    let file = parse_data_uri("data:application/octet-stream;base64,-_8", false).unwrap();
    assert_eq!(file.data, vec![0xfb, 0xff]);
  }

  #[test]
  fn test_strict_mode_rejects_invalid_base64() {
    assert_eq!(parse_data_uri("data:text/plain;base64,aGV$$sbG8", true), None);
    let file = parse_data_uri("data:text/plain;base64,aGVsbG8=", true).unwrap();
    assert_eq!(file.data, b"hello");
  }

  #[test]
  fn test_name_parameter_sets_filename() {
    let file = parse_data_uri("data:image/png;name=photo%201.png;base64,aGk=", false).unwrap();
    assert_eq!(file.filename, "photo 1.png");
    assert_eq!(file.extension, "png");
  }

  #[test]
  fn test_comma_in_header_before_marker() {
    let file = parse_data_uri("data:image/png;name=a,b.png;base64,aGk=", false).unwrap();
    assert_eq!(file.filename, "a,b.png");
    assert_eq!(file.data, b"hi");
    assert_eq!(file.extension, "png");
  }

  #[test]
  fn test_marker_is_case_insensitive() {
    let file = parse_data_uri("data:image/png;BASE64,aGk=", false).unwrap();
    assert_eq!(file.data, b"hi");
  }

  #[test]
  fn test_large_payload() {
    let data = vec![0xabu8; 5 * 1024 * 1024];
    let uri = format!("data:application/pdf;base64,{}", STANDARD.encode(&data));
    let file = parse_data_uri(&uri, false).unwrap();
    assert_eq!(file.len(), data.len());
    assert_eq!(file.extension, "pdf");
  }

  #[test]
  fn test_extended_filename_wins() {
    let header = "attachment; filename=\"fallback.txt\"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf";
    assert_eq!(
      filename_from_content_disposition(header).as_deref(),
      Some("résumé.pdf")
    );
  }

  #[test]
  fn test_quoted_filename() {
    let header = "attachment; filename=\"report; final.csv\"";
    assert_eq!(
      filename_from_content_disposition(header).as_deref(),
      Some("report; final.csv")
    );
  }

  #[test]
  fn test_unquoted_filename() {
    let header = "inline; filename=data.json; size=42";
    assert_eq!(
      filename_from_content_disposition(header).as_deref(),
      Some("data.json")
    );
  }

  #[test]
  fn test_unterminated_quote_is_rejected() {
    let header = format!("attachment; filename=\"{}", "a".repeat(4096));
    assert_eq!(filename_from_content_disposition(&header), None);
  }

  #[test]
  fn test_directory_components_are_stripped() {
    let header = "attachment; filename=\"../../etc/passwd\"";
    assert_eq!(
      filename_from_content_disposition(header).as_deref(),
      Some("passwd")
    );
  }

  #[test]
  fn test_no_filename() {
    assert_eq!(filename_from_content_disposition("inline"), None);
  }

  #[test]
  fn test_url_path_filename() {
    let url = url::Url::parse("https://cdn.example.com/files/invoice%2042.pdf?sig=abc").unwrap();
    assert_eq!(filename_from_url_path(&url).as_deref(), Some("invoice 42.pdf"));

    let url = url::Url::parse("https://cdn.example.com/download/12345").unwrap();
    assert_eq!(filename_from_url_path(&url), None);
  }

  #[test]
  fn test_serializes_data_as_base64() {
    let file = ApFile::new("a.txt", b"hi".to_vec(), "txt");
    let value = serde_json::to_value(&file).unwrap();
    assert_eq!(value["data"], "aGk=");

    let back: ApFile = serde_json::from_value(value).unwrap();
    assert_eq!(back, file);
  }

  #[test]
  fn test_named_file_extension() {
    let file = ApFile::named("Report.PDF".to_string(), vec![], Some("text/plain"));
    assert_eq!(file.extension, "pdf");

    let file = ApFile::named("README".to_string(), vec![], Some("text/plain"));
    assert_eq!(file.extension, "txt");
  }
}
